/// Identifier of a view within a reconstruction.
pub type ViewId = u32;

/// Identifier of a track within a reconstruction.
pub type TrackId = u32;
