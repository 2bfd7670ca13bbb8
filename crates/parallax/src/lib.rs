#![doc = include_str!("../README.md")]

#[doc(inline)]
pub use parallax_ransac as ransac;

#[doc(inline)]
pub use parallax_sfm as sfm;

#[doc(no_inline)]
pub use parallax_sfm::glam;
