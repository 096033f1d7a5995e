//! Track geometry: centerline resampling, arc length and zone classification.

use crate::config::TrackConfig;
use crate::grid::SampleIndex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 2D vector used for positions and velocities
pub type Vec2 = nalgebra::Vector2<f64>;

/// Absolute tolerance used when comparing resampled spacing
const SPACING_TOLERANCE: f64 = 1e-6;

/// Drawing lifecycle of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    Empty,
    Drawing,
    Ready,
}

/// Classification of a world point relative to the centerline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Road,
    Runoff,
    Wall,
    Goal,
    OffTrack,
}

impl Zone {
    /// Impassable for collision and sensing
    #[inline]
    pub fn is_wall(self) -> bool {
        matches!(self, Zone::Wall | Zone::OffTrack)
    }
}

/// Centerline of a drawn track
///
/// Raw points are appended while drawing and then resampled by [`Track::smooth`]
/// so that consecutive samples sit `segment_length` apart. Every query below
/// works on whatever points are currently stored.
#[derive(Clone, Debug)]
pub struct Track {
    points: Vec<Vec2>,
    state: TrackState,
    config: TrackConfig,
    index: SampleIndex,
}

impl Serialize for Track {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Track", 3)?;
        state.serialize_field("points", &self.points)?;
        state.serialize_field("state", &self.state)?;
        state.serialize_field("config", &self.config)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Track {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TrackData {
            points: Vec<Vec2>,
            state: TrackState,
            config: TrackConfig,
        }

        let data = TrackData::deserialize(deserializer)?;
        let mut track = Track::from_points(data.points, data.config);
        track.state = data.state;
        Ok(track)
    }
}

impl Track {
    /// Create an empty track
    pub fn new(config: TrackConfig) -> Self {
        let index = SampleIndex::new(Self::outer_radius_for(&config));
        Self {
            points: Vec::new(),
            state: TrackState::Empty,
            config,
            index,
        }
    }

    /// Create a track from raw (unsmoothed) points
    pub fn from_points(points: Vec<Vec2>, config: TrackConfig) -> Self {
        let mut track = Self::new(config);
        for p in points {
            track.add_point(p);
        }
        track
    }

    /// Elliptical arc sampled every `step_degrees`, already smoothed
    ///
    /// Leaving a gap in the sweep keeps the goal away from the start.
    pub fn arc(center: Vec2, radii: Vec2, sweep_degrees: f64, config: TrackConfig) -> Self {
        let step_degrees = 2.0;
        let steps = (sweep_degrees.abs() / step_degrees).ceil().max(1.0) as usize;
        let points = (0..=steps)
            .map(|i| {
                let theta = (sweep_degrees * i as f64 / steps as f64).to_radians();
                center + Vec2::new(radii.x * theta.cos(), radii.y * theta.sin())
            })
            .collect();

        let mut track = Self::from_points(points, config);
        track.smooth();
        track
    }

    /// Remove all points
    pub fn clear(&mut self) {
        self.points.clear();
        self.index.clear();
        self.state = TrackState::Empty;
    }

    /// Append a raw point while drawing
    pub fn add_point(&mut self, point: Vec2) {
        self.index.insert(&point, self.points.len());
        self.points.push(point);
        if self.points.len() > 1 {
            self.state = TrackState::Drawing;
        }
    }

    /// Resample the points to near-uniform `segment_length` spacing
    ///
    /// Walks the raw points from the last emitted sample, emitting an
    /// interpolated sample each time the next raw point is more than one
    /// segment away. A raw point is kept when it lands exactly one segment
    /// out, and the final raw point is always kept unless it coincides with
    /// the last sample, so only the closing segment can be short.
    pub fn smooth(&mut self) {
        if self.points.len() < 2 {
            return;
        }

        let spacing = self.segment_length();
        let raw = std::mem::take(&mut self.points);
        let last_raw = raw.len() - 1;

        let mut resolved = Vec::with_capacity(raw.len());
        resolved.push(raw[0]);

        for (i, &target) in raw.iter().enumerate().skip(1) {
            let mut from = resolved[resolved.len() - 1];
            let mut remaining = (target - from).norm();

            while remaining > spacing + SPACING_TOLERANCE {
                let next = from + (target - from) * (spacing / remaining);
                resolved.push(next);
                from = next;
                remaining = (target - from).norm();
            }

            let exact = (remaining - spacing).abs() <= SPACING_TOLERANCE;
            let closing = i == last_raw && remaining > SPACING_TOLERANCE;
            if exact || closing {
                resolved.push(target);
            }
        }

        log::debug!("Track smoothed: {} raw points -> {} samples", raw.len(), resolved.len());

        self.points = resolved;
        self.index.rebuild(&self.points);
        self.state = TrackState::Ready;
    }

    /// Target spacing between resampled points
    #[inline]
    pub fn segment_length(&self) -> f64 {
        self.config.road_width / 4.0
    }

    /// Distance from the centerline to the outer edge of the wall band
    #[inline]
    pub fn outer_radius(&self) -> f64 {
        Self::outer_radius_for(&self.config)
    }

    fn outer_radius_for(config: &TrackConfig) -> f64 {
        config.road_width / 2.0 + config.runoff_width + config.wall_width
    }

    /// Total arc length: `(count - 2) * segment_length + |last - second_to_last|`
    pub fn length(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (n - 2) as f64 * self.segment_length() + self.last_segment()
    }

    #[inline]
    fn last_segment(&self) -> f64 {
        let n = self.points.len();
        (self.points[n - 1] - self.points[n - 2]).norm()
    }

    /// Index of the sample closest to `point`; the first one wins on ties
    pub fn nearest_index(&self, point: &Vec2) -> Option<usize> {
        let mut closest = None;
        let mut closest_dist = f64::INFINITY;
        for (i, p) in self.points.iter().enumerate() {
            let d = (p - point).norm_squared();
            if d < closest_dist {
                closest_dist = d;
                closest = Some(i);
            }
        }
        closest
    }

    /// Length still to drive from the sample nearest to `point`
    ///
    /// The nearest sample's own segment counts as covered, so the first
    /// sample reports `length() - segment_length()` and the last two samples
    /// report zero.
    pub fn remaining_length(&self, point: &Vec2) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        match self.nearest_index(point) {
            Some(i) if i + 2 < n => (n - i - 3) as f64 * self.segment_length() + self.last_segment(),
            _ => 0.0,
        }
    }

    /// Fraction of the track covered at `point`, in [0, 1]; zero for degenerate tracks
    pub fn traveled_fraction(&self, point: &Vec2) -> f64 {
        let length = self.length();
        if length <= 0.0 {
            return 0.0;
        }
        ((length - self.remaining_length(point)) / length).clamp(0.0, 1.0)
    }

    /// Classify a world point by its distance to the centerline
    pub fn classify(&self, point: &Vec2) -> Zone {
        let Some(last) = self.points.last() else {
            return Zone::OffTrack;
        };
        if (point - last).norm() <= self.config.goal_width / 2.0 {
            return Zone::Goal;
        }

        let road = self.config.road_width / 2.0;
        let runoff = road + self.config.runoff_width;
        match self.index.nearest_within(&self.points, point, self.outer_radius()) {
            Some(d) if d <= road => Zone::Road,
            Some(d) if d <= runoff => Zone::Runoff,
            Some(_) => Zone::Wall,
            None => Zone::OffTrack,
        }
    }

    /// Start position and heading (degrees) for new cars
    ///
    /// Cars face along the first segment. Tracks with fewer than two points
    /// fall back to heading 0, and an empty track to (100, 100).
    pub fn start_pose(&self) -> (Vec2, f64) {
        match self.points.as_slice() {
            [] => (Vec2::new(100.0, 100.0), 0.0),
            [only] => (*only, 0.0),
            [first, second, ..] => {
                let dir = second - first;
                (*first, dir.y.atan2(dir.x).to_degrees())
            }
        }
    }

    /// Current samples, for drawing the path
    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    /// Load raw points from a JSON file holding `[[x, y], ...]`
    pub fn load_points<P: AsRef<Path>>(path: P) -> Result<Vec<Vec2>, TrackLoadError> {
        let json = std::fs::read_to_string(path)?;
        let points: Vec<Vec2> = serde_json::from_str(&json)?;
        if let Some(bad) = points.iter().find(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(TrackLoadError::NonFinite(*bad));
        }
        if points.len() < 2 {
            return Err(TrackLoadError::TooFewPoints(points.len()));
        }
        Ok(points)
    }

    /// Load a track file and smooth it
    pub fn from_file<P: AsRef<Path>>(path: P, config: TrackConfig) -> Result<Self, TrackLoadError> {
        let mut track = Self::from_points(Self::load_points(path)?, config);
        track.smooth();
        Ok(track)
    }

    /// Save the current samples as `[[x, y], ...]`
    pub fn save_points<P: AsRef<Path>>(&self, path: P) -> Result<(), TrackLoadError> {
        let json = serde_json::to_string(&self.points)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Errors that can occur while reading a track file
#[derive(Debug)]
pub enum TrackLoadError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    TooFewPoints(usize),
    NonFinite(Vec2),
}

impl std::fmt::Display for TrackLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::TooFewPoints(n) => write!(f, "Track needs at least 2 points, found {}", n),
            Self::NonFinite(p) => write!(f, "Non-finite track point ({}, {})", p.x, p.y),
        }
    }
}

impl std::error::Error for TrackLoadError {}

impl From<std::io::Error> for TrackLoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for TrackLoadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(length: f64) -> Track {
        let mut track = Track::new(TrackConfig::default());
        track.add_point(Vec2::new(0.0, 0.0));
        track.add_point(Vec2::new(length, 0.0));
        track.smooth();
        track
    }

    fn spacings(track: &Track) -> Vec<f64> {
        track.points().windows(2).map(|w| (w[1] - w[0]).norm()).collect()
    }

    #[test]
    fn test_state_transitions() {
        let mut track = Track::new(TrackConfig::default());
        assert_eq!(track.state(), TrackState::Empty);
        track.add_point(Vec2::new(0.0, 0.0));
        assert_eq!(track.state(), TrackState::Empty);
        track.add_point(Vec2::new(40.0, 0.0));
        assert_eq!(track.state(), TrackState::Drawing);
        track.smooth();
        assert_eq!(track.state(), TrackState::Ready);
        track.clear();
        assert_eq!(track.state(), TrackState::Empty);
        assert!(track.is_empty());
    }

    #[test]
    fn test_straight_resampling() {
        let track = straight(100.0);
        assert_eq!(track.len(), 9);
        assert!((track.length() - 100.0).abs() < 1e-9);
        for d in spacings(&track) {
            assert!((d - 12.5).abs() < 1e-6);
        }
        assert_eq!(*track.points().last().unwrap(), Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_short_final_segment() {
        let track = straight(30.0);
        let d = spacings(&track);
        assert_eq!(d.len(), 3);
        assert!((d[0] - 12.5).abs() < 1e-9);
        assert!((d[1] - 12.5).abs() < 1e-9);
        assert!((d[2] - 5.0).abs() < 1e-9);
        assert!((track.length() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_spacing_bound_on_polyline() {
        let mut track = Track::new(TrackConfig::default());
        let raw = [
            (0.0, 0.0),
            (3.0, 1.0),
            (40.0, 7.0),
            (41.0, 60.0),
            (90.0, 61.0),
            (95.0, 63.0),
            (200.0, -20.0),
        ];
        for (x, y) in raw {
            track.add_point(Vec2::new(x, y));
        }
        track.smooth();

        let seg = track.segment_length();
        let d = spacings(&track);
        let (last, body) = d.split_last().unwrap();
        for &s in body {
            assert!(s <= seg + 1e-6, "segment {} exceeds {}", s, seg);
            assert!((s - seg).abs() < 1e-6);
        }
        assert!(*last <= seg + 1e-6);
    }

    #[test]
    fn test_smooth_degenerate_is_noop() {
        let mut track = Track::new(TrackConfig::default());
        track.smooth();
        assert!(track.is_empty());

        track.add_point(Vec2::new(5.0, 5.0));
        track.smooth();
        assert_eq!(track.points(), &[Vec2::new(5.0, 5.0)]);
        assert_eq!(track.length(), 0.0);
        assert_eq!(track.remaining_length(&Vec2::new(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_length_monotonic_in_extent() {
        let mut previous = 0.0;
        for length in [0.0, 10.0, 12.5, 40.0, 100.0, 333.0] {
            let track = straight(length);
            assert!(track.length() >= 0.0);
            assert!(track.length() >= previous);
            previous = track.length();
        }
    }

    #[test]
    fn test_remaining_length_boundaries() {
        let track = straight(100.0);
        let pts = track.points().to_vec();
        let seg = track.segment_length();

        assert_eq!(track.remaining_length(&pts[pts.len() - 1]), 0.0);
        assert_eq!(track.remaining_length(&pts[pts.len() - 2]), 0.0);
        assert!((track.remaining_length(&pts[0]) - (track.length() - seg)).abs() < 1e-9);
        assert!((track.remaining_length(&pts[3]) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_index_tie_break() {
        let track = straight(100.0);
        // Exactly halfway between samples 0 and 1
        assert_eq!(track.nearest_index(&Vec2::new(6.25, 10.0)), Some(0));
        assert_eq!(Track::new(TrackConfig::default()).nearest_index(&Vec2::zeros()), None);
    }

    #[test]
    fn test_classify_bands() {
        let track = straight(200.0);
        // Bands: road <= 25, runoff <= 75, wall <= 95
        assert_eq!(track.classify(&Vec2::new(50.0, 0.0)), Zone::Road);
        assert_eq!(track.classify(&Vec2::new(50.0, 25.0)), Zone::Road);
        assert_eq!(track.classify(&Vec2::new(50.0, 26.0)), Zone::Runoff);
        assert_eq!(track.classify(&Vec2::new(50.0, -75.0)), Zone::Runoff);
        assert_eq!(track.classify(&Vec2::new(50.0, 80.0)), Zone::Wall);
        assert_eq!(track.classify(&Vec2::new(50.0, 96.0)), Zone::OffTrack);
        assert_eq!(track.classify(&Vec2::new(200.0, 10.0)), Zone::Goal);
        assert_eq!(track.classify(&Vec2::new(5000.0, 0.0)), Zone::OffTrack);
        assert!(Zone::OffTrack.is_wall());
        assert!(Zone::Wall.is_wall());
        assert!(!Zone::Runoff.is_wall());
    }

    #[test]
    fn test_classify_matches_brute_force() {
        let track = Track::arc(Vec2::new(400.0, 300.0), Vec2::new(250.0, 180.0), 300.0, TrackConfig::default());
        let cfg = TrackConfig::default();
        for i in 0..40 {
            for j in 0..30 {
                let p = Vec2::new(i as f64 * 20.0, j as f64 * 20.0);
                let d = track
                    .points()
                    .iter()
                    .map(|q| (q - p).norm())
                    .fold(f64::INFINITY, f64::min);
                let goal = (p - track.points().last().unwrap()).norm() <= cfg.goal_width / 2.0;
                let expected = if goal {
                    Zone::Goal
                } else if d <= 25.0 {
                    Zone::Road
                } else if d <= 75.0 {
                    Zone::Runoff
                } else if d <= 95.0 {
                    Zone::Wall
                } else {
                    Zone::OffTrack
                };
                assert_eq!(track.classify(&p), expected, "at {:?}", p);
            }
        }
    }

    #[test]
    fn test_empty_track_fallbacks() {
        let track = Track::new(TrackConfig::default());
        assert_eq!(track.length(), 0.0);
        assert_eq!(track.traveled_fraction(&Vec2::zeros()), 0.0);
        assert_eq!(track.classify(&Vec2::zeros()), Zone::OffTrack);
        assert_eq!(track.start_pose(), (Vec2::new(100.0, 100.0), 0.0));
    }

    #[test]
    fn test_start_pose_faces_first_segment() {
        let mut track = Track::new(TrackConfig::default());
        track.add_point(Vec2::new(10.0, 10.0));
        track.add_point(Vec2::new(10.0, 60.0));
        track.smooth();
        let (pos, heading) = track.start_pose();
        assert_eq!(pos, Vec2::new(10.0, 10.0));
        assert!((heading - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let track = straight(100.0);
        let json = serde_json::to_string(&track).unwrap();
        let loaded: Track = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.points(), track.points());
        assert_eq!(loaded.state(), TrackState::Ready);
        assert_eq!(loaded.classify(&Vec2::new(50.0, 0.0)), Zone::Road);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.json");
        std::fs::write(&path, "[[0.0, 0.0], [50.0, 0.0], [50.0, 50.0]]").unwrap();

        let track = Track::from_file(&path, TrackConfig::default()).unwrap();
        assert_eq!(track.state(), TrackState::Ready);
        assert!((track.length() - 100.0).abs() < 1e-6);

        let out = dir.path().join("samples.json");
        track.save_points(&out).unwrap();
        assert_eq!(Track::load_points(&out).unwrap().len(), track.len());
    }

    #[test]
    fn test_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.json");
        std::fs::write(&path, "[[1.0, 2.0]]").unwrap();
        assert!(matches!(Track::load_points(&path), Err(TrackLoadError::TooFewPoints(1))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Track::load_points(&path), Err(TrackLoadError::Parse(_))));

        assert!(matches!(
            Track::load_points(dir.path().join("missing.json")),
            Err(TrackLoadError::Io(_))
        ));
    }
}
