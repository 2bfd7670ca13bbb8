use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Deref;

use glam::{DMat3, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::{Track, TrackId, ViewId};

/// Errors returned by [`Reconstruction`] mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionError {
    /// A view with this name already exists.
    #[error("A view named {0:?} already exists")]
    DuplicateViewName(String),

    /// No view with this id.
    #[error("Unknown view id {0}")]
    UnknownView(ViewId),

    /// No track with this id.
    #[error("Unknown track id {0}")]
    UnknownTrack(TrackId),
}

/// Extrinsics of a calibrated camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Rotation from world to camera.
    pub orientation: DMat3,
    /// Camera center in world coordinates.
    pub position: DVec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            orientation: DMat3::IDENTITY,
            position: DVec3::ZERO,
        }
    }
}

impl Camera {
    /// Create a camera from its orientation and center.
    pub fn new(orientation: DMat3, position: DVec3) -> Self {
        Self {
            orientation,
            position,
        }
    }

    /// Express a world point in the camera frame.
    pub fn world_to_camera(&self, point: DVec3) -> DVec3 {
        self.orientation * (point - self.position)
    }
}

/// An image in the reconstruction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    name: String,
    /// Camera pose of the view.
    pub camera: Camera,
    /// Whether the camera pose has been estimated.
    pub is_estimated: bool,
    track_ids: BTreeSet<TrackId>,
}

impl View {
    /// Unique name of the view, e.g. the image file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tracks observed in this view.
    pub fn track_ids(&self) -> &BTreeSet<TrackId> {
        &self.track_ids
    }

    /// Number of tracks observed in this view.
    pub fn num_tracks(&self) -> usize {
        self.track_ids.len()
    }
}

/// Mutable handle on a track owned by a [`Reconstruction`].
///
/// Reads go through [`Deref`] to the [`Track`]. Only the estimated quantities
/// can be written; observations change through
/// [`Reconstruction::add_observation`] and
/// [`Reconstruction::remove_observation`].
#[derive(Debug)]
pub struct TrackMut<'a> {
    track: &'a mut Track,
}

impl Deref for TrackMut<'_> {
    type Target = Track;

    fn deref(&self) -> &Track {
        self.track
    }
}

impl TrackMut<'_> {
    /// See [`Track::set_reference_bearing`].
    pub fn set_reference_bearing(&mut self, bearing: DVec3) {
        self.track.set_reference_bearing(bearing);
    }

    /// See [`Track::inverse_depth_mut`].
    pub fn inverse_depth_mut(&mut self) -> &mut f64 {
        self.track.inverse_depth_mut()
    }

    /// See [`Track::set_inverse_depth`].
    pub fn set_inverse_depth(&mut self, inverse_depth: f64) {
        self.track.set_inverse_depth(inverse_depth);
    }

    /// See [`Track::set_reference_descriptor`].
    pub fn set_reference_descriptor(&mut self, descriptor: Vec<f32>) {
        self.track.set_reference_descriptor(descriptor);
    }

    /// See [`Track::point_mut`].
    pub fn point_mut(&mut self) -> &mut DVec4 {
        self.track.point_mut()
    }

    /// See [`Track::set_point`].
    pub fn set_point(&mut self, point: DVec4) {
        self.track.set_point(point);
    }

    /// See [`Track::set_color`].
    pub fn set_color(&mut self, color: [u8; 3]) {
        self.track.set_color(color);
    }

    /// See [`Track::set_estimated`].
    pub fn set_estimated(&mut self, is_estimated: bool) {
        self.track.set_estimated(is_estimated);
    }
}

/// Views and tracks of a scene, keyed by id.
///
/// The reconstruction owns every [`Track`] and keeps the observation links
/// symmetric: a view lists a track exactly when the track lists the view.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Reconstruction {
    views: BTreeMap<ViewId, View>,
    tracks: BTreeMap<TrackId, Track>,
    view_names: HashMap<String, ViewId>,
    next_view_id: ViewId,
    next_track_id: TrackId,
}

impl Reconstruction {
    /// Create an empty reconstruction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a view with a unique name and return its id.
    pub fn add_view(&mut self, name: &str) -> Result<ViewId, ReconstructionError> {
        if self.view_names.contains_key(name) {
            return Err(ReconstructionError::DuplicateViewName(name.to_string()));
        }
        let id = self.next_view_id;
        self.next_view_id += 1;
        self.views.insert(
            id,
            View {
                name: name.to_string(),
                ..Default::default()
            },
        );
        self.view_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Remove a view and its observations.
    ///
    /// Tracks left without observations are removed as well.
    pub fn remove_view(&mut self, view_id: ViewId) -> Result<View, ReconstructionError> {
        let view = self
            .views
            .remove(&view_id)
            .ok_or(ReconstructionError::UnknownView(view_id))?;
        self.view_names.remove(&view.name);

        for track_id in &view.track_ids {
            let Some(track) = self.tracks.get_mut(track_id) else {
                continue;
            };
            track.remove_view(view_id);
            if track.num_views() == 0 {
                self.tracks.remove(track_id);
            }
        }
        log::debug!(
            "removed view {view_id} ({}) with {} observations",
            view.name,
            view.track_ids.len()
        );
        Ok(view)
    }

    /// View with the given id.
    pub fn view(&self, view_id: ViewId) -> Option<&View> {
        self.views.get(&view_id)
    }

    /// Mutable view with the given id.
    pub fn view_mut(&mut self, view_id: ViewId) -> Option<&mut View> {
        self.views.get_mut(&view_id)
    }

    /// Id of the view with the given name.
    pub fn view_id_from_name(&self, name: &str) -> Option<ViewId> {
        self.view_names.get(name).copied()
    }

    /// Ids of all views, ascending.
    pub fn view_ids(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.views.keys().copied()
    }

    /// Number of views.
    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    /// Add a track observed by the given views and return its id.
    pub fn add_track(&mut self, view_ids: &[ViewId]) -> Result<TrackId, ReconstructionError> {
        if let Some(&missing) = view_ids.iter().find(|&&id| !self.views.contains_key(&id)) {
            return Err(ReconstructionError::UnknownView(missing));
        }
        let id = self.next_track_id;
        self.next_track_id += 1;

        let mut track = Track::new();
        for &view_id in view_ids {
            track.add_view(view_id);
            if let Some(view) = self.views.get_mut(&view_id) {
                view.track_ids.insert(id);
            }
        }
        self.tracks.insert(id, track);
        Ok(id)
    }

    /// Record that `view_id` observes `track_id`.
    ///
    /// Returns `false` if the observation already existed.
    pub fn add_observation(
        &mut self,
        view_id: ViewId,
        track_id: TrackId,
    ) -> Result<bool, ReconstructionError> {
        let view = self
            .views
            .get_mut(&view_id)
            .ok_or(ReconstructionError::UnknownView(view_id))?;
        let track = self
            .tracks
            .get_mut(&track_id)
            .ok_or(ReconstructionError::UnknownTrack(track_id))?;
        view.track_ids.insert(track_id);
        Ok(track.add_view(view_id))
    }

    /// Drop the observation of `track_id` in `view_id`.
    ///
    /// The track is kept even if it loses its last view. Returns `false` if
    /// there was no such observation.
    pub fn remove_observation(
        &mut self,
        view_id: ViewId,
        track_id: TrackId,
    ) -> Result<bool, ReconstructionError> {
        let view = self
            .views
            .get_mut(&view_id)
            .ok_or(ReconstructionError::UnknownView(view_id))?;
        let track = self
            .tracks
            .get_mut(&track_id)
            .ok_or(ReconstructionError::UnknownTrack(track_id))?;
        view.track_ids.remove(&track_id);
        Ok(track.remove_view(view_id))
    }

    /// Track with the given id.
    pub fn track(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    /// Mutable handle on the track with the given id.
    pub fn track_mut(&mut self, track_id: TrackId) -> Option<TrackMut<'_>> {
        self.tracks.get_mut(&track_id).map(|track| TrackMut { track })
    }

    /// Remove a track and its observations.
    pub fn remove_track(&mut self, track_id: TrackId) -> Result<Track, ReconstructionError> {
        let track = self
            .tracks
            .remove(&track_id)
            .ok_or(ReconstructionError::UnknownTrack(track_id))?;
        for view_id in track.view_ids() {
            if let Some(view) = self.views.get_mut(view_id) {
                view.track_ids.remove(&track_id);
            }
        }
        Ok(track)
    }

    /// Ids of all tracks, ascending.
    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    /// Number of tracks.
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Iterate over all views.
    pub fn views(&self) -> impl Iterator<Item = (ViewId, &View)> {
        self.views.iter().map(|(id, view)| (*id, view))
    }

    /// Iterate mutably over all views.
    pub fn views_mut(&mut self) -> impl Iterator<Item = (ViewId, &mut View)> {
        self.views.iter_mut().map(|(id, view)| (*id, view))
    }

    /// Iterate over all tracks.
    pub fn tracks(&self) -> impl Iterator<Item = (TrackId, &Track)> {
        self.tracks.iter().map(|(id, track)| (*id, track))
    }

    /// Iterate mutably over all tracks.
    pub fn tracks_mut(&mut self) -> impl Iterator<Item = (TrackId, TrackMut<'_>)> {
        self.tracks
            .iter_mut()
            .map(|(id, track)| (*id, TrackMut { track }))
    }

    /// Homogeneous point of a track from its inverse-depth parameterization
    /// and the camera of its reference view.
    ///
    /// Returns `None` for unknown tracks and tracks without views.
    pub fn track_point_from_inverse_depth(&self, track_id: TrackId) -> Option<DVec4> {
        let track = self.tracks.get(&track_id)?;
        let view = self.views.get(&track.reference_view_id()?)?;
        Some(track.inverse_depth_point(&view.camera.orientation, &view.camera.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_by_name() -> Result<(), ReconstructionError> {
        let mut recon = Reconstruction::new();
        let a = recon.add_view("a.png")?;
        let b = recon.add_view("b.png")?;
        assert_ne!(a, b);
        assert_eq!(recon.view_id_from_name("b.png"), Some(b));
        assert_eq!(
            recon.add_view("a.png"),
            Err(ReconstructionError::DuplicateViewName("a.png".to_string()))
        );
        assert_eq!(recon.view(a).map(View::name), Some("a.png"));
        Ok(())
    }

    #[test]
    fn test_observations_stay_symmetric() -> Result<(), ReconstructionError> {
        let mut recon = Reconstruction::new();
        let a = recon.add_view("a")?;
        let b = recon.add_view("b")?;
        let c = recon.add_view("c")?;

        let t = recon.add_track(&[a, b])?;
        assert!(recon.add_observation(c, t)?);
        assert!(!recon.add_observation(c, t)?);
        assert_eq!(recon.track(t).map(Track::num_views), Some(3));
        assert!(recon.view(c).is_some_and(|v| v.track_ids().contains(&t)));

        assert!(recon.remove_observation(a, t)?);
        assert!(!recon.remove_observation(a, t)?);
        assert_eq!(recon.track(t).and_then(Track::reference_view_id), Some(b));
        assert_eq!(recon.view(a).map(View::num_tracks), Some(0));

        assert_eq!(
            recon.add_observation(a, 99),
            Err(ReconstructionError::UnknownTrack(99))
        );
        assert_eq!(
            recon.add_track(&[a, 42]),
            Err(ReconstructionError::UnknownView(42))
        );
        Ok(())
    }

    #[test]
    fn test_remove_view_drops_orphaned_tracks() -> Result<(), ReconstructionError> {
        let mut recon = Reconstruction::new();
        let a = recon.add_view("a")?;
        let b = recon.add_view("b")?;
        let shared = recon.add_track(&[a, b])?;
        let single = recon.add_track(&[a])?;

        let removed = recon.remove_view(a)?;
        assert_eq!(removed.name(), "a");
        assert_eq!(recon.view_id_from_name("a"), None);
        assert!(recon.track(single).is_none());
        assert_eq!(recon.track(shared).and_then(Track::reference_view_id), Some(b));
        assert_eq!(recon.num_tracks(), 1);

        let track = recon.remove_track(shared)?;
        assert_eq!(track.num_views(), 1);
        assert_eq!(recon.view(b).map(View::num_tracks), Some(0));
        Ok(())
    }

    #[test]
    fn test_track_point_from_inverse_depth() -> Result<(), ReconstructionError> {
        let mut recon = Reconstruction::new();
        let a = recon.add_view("a")?;
        if let Some(view) = recon.view_mut(a) {
            view.camera = Camera::new(DMat3::IDENTITY, DVec3::new(0.0, 0.0, -1.0));
        }
        let t = recon.add_track(&[a])?;
        if let Some(mut track) = recon.track_mut(t) {
            track.set_reference_bearing(DVec3::Z);
            track.set_inverse_depth(0.25);
        }
        assert_eq!(
            recon.track_point_from_inverse_depth(t),
            Some(DVec4::new(0.0, 0.0, 3.0, 1.0))
        );
        Ok(())
    }

    #[test]
    fn test_track_handle_keeps_observations() -> Result<(), ReconstructionError> {
        let mut recon = Reconstruction::new();
        let a = recon.add_view("a")?;
        let b = recon.add_view("b")?;
        let t = recon.add_track(&[a, b])?;

        if let Some(mut track) = recon.track_mut(t) {
            track.set_point(DVec4::new(1.0, 2.0, 3.0, 1.0));
            track.point_mut().w = 0.5;
            *track.inverse_depth_mut() = 0.1;
            track.set_color([10, 20, 30]);
            track.set_estimated(true);
            assert_eq!(track.num_views(), 2);
        }
        for (_, mut track) in recon.tracks_mut() {
            track.set_reference_descriptor(vec![0.5; 4]);
        }

        let track = recon.track(t).ok_or(ReconstructionError::UnknownTrack(t))?;
        assert_eq!(track.point(), DVec4::new(1.0, 2.0, 3.0, 0.5));
        assert_eq!(track.inverse_depth(), 0.1);
        assert_eq!(track.color(), [10, 20, 30]);
        assert_eq!(track.reference_descriptor(), &[0.5; 4]);
        assert!(track.is_estimated());
        assert_eq!(track.view_ids().iter().copied().collect::<Vec<_>>(), vec![a, b]);
        for view_id in [a, b] {
            assert!(recon.view(view_id).is_some_and(|v| v.track_ids().contains(&t)));
        }
        Ok(())
    }
}
