//! Checkpoint system for saving and loading evolution state.

use crate::config::Config;
use crate::neural::Controller;
use crate::track::Track;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes identifying a checkpoint file
const MAGIC: &[u8; 4] = b"NDRV";

/// Prefix of periodic checkpoint files managed by [`CheckpointManager`]
const PERIODIC_PREFIX: &str = "checkpoint_";

/// File name for the end-of-run checkpoint; outside the periodic prefix so
/// retention and `find_latest` never touch it
pub const FINAL_CHECKPOINT: &str = "final.bin";

/// Evolution state at a generation boundary
#[derive(Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Version for compatibility checking
    pub version: u32,
    /// Generation about to run
    pub generation: u32,
    /// Configuration
    pub config: Config,
    /// Smoothed track
    pub track: Track,
    /// One controller per car, in population order
    pub controllers: Vec<Controller>,
    /// Fastest finish over all generations, in ticks
    pub fastest_all_time: Option<u32>,
    /// Random seed (for reproducibility)
    pub random_seed: u64,
}

impl Checkpoint {
    /// Current checkpoint version
    pub const VERSION: u32 = 1;

    /// Create a new checkpoint
    pub fn new(
        generation: u32,
        config: Config,
        track: Track,
        controllers: Vec<Controller>,
        fastest_all_time: Option<u32>,
        random_seed: u64,
    ) -> Self {
        Self {
            version: Self::VERSION,
            generation,
            config,
            track,
            controllers,
            fastest_all_time,
            random_seed,
        }
    }

    /// Save checkpoint to binary file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        let encoded = bincode::serialize(self)?;
        writer.write_all(&encoded)?;
        writer.flush()?;

        Ok(())
    }

    /// Load checkpoint from binary file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CheckpointError::InvalidFormat("Invalid magic bytes".to_string()));
        }

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let checkpoint: Checkpoint = bincode::deserialize(&buffer)?;

        if checkpoint.version != Self::VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: Self::VERSION,
                found: checkpoint.version,
            });
        }
        checkpoint.config.validate().map_err(CheckpointError::InvalidFormat)?;
        if let Some(bad) = checkpoint.controllers.iter().position(|c| !c.is_valid()) {
            return Err(CheckpointError::InvalidFormat(format!(
                "Controller {} has non-finite weights",
                bad
            )));
        }

        Ok(checkpoint)
    }

    /// Get approximate size in bytes
    pub fn size_bytes(&self) -> usize {
        bincode::serialized_size(self).unwrap_or(0) as usize
    }
}

/// Errors that can occur during checkpoint operations
#[derive(Debug)]
pub enum CheckpointError {
    Io(std::io::Error),
    Serialization(bincode::Error),
    InvalidFormat(String),
    VersionMismatch { expected: u32, found: u32 },
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            Self::VersionMismatch { expected, found } => {
                write!(f, "Version mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<std::io::Error> for CheckpointError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<bincode::Error> for CheckpointError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e)
    }
}

/// Saves checkpoints every few generations and prunes old ones
pub struct CheckpointManager {
    /// Base directory for checkpoints
    pub base_dir: String,
    /// Generations between checkpoints
    pub interval: u32,
    /// Maximum checkpoints to keep
    pub max_checkpoints: usize,
    last_generation: Option<u32>,
}

impl CheckpointManager {
    /// Create a new checkpoint manager
    pub fn new(base_dir: String, interval: u32, max_checkpoints: usize) -> Self {
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            log::warn!("Could not create checkpoint directory {}: {}", base_dir, e);
        }

        Self {
            base_dir,
            interval: interval.max(1),
            max_checkpoints: max_checkpoints.max(1),
            last_generation: None,
        }
    }

    /// Check if a checkpoint should be saved
    pub fn should_save(&self, generation: u32) -> bool {
        generation > 0 && generation % self.interval == 0 && self.last_generation != Some(generation)
    }

    /// Generate checkpoint filename
    pub fn checkpoint_path(&self, generation: u32) -> String {
        format!("{}/{}{:06}.bin", self.base_dir, PERIODIC_PREFIX, generation)
    }

    /// Save checkpoint and prune old ones
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<String, CheckpointError> {
        let path = self.checkpoint_path(checkpoint.generation);
        checkpoint.save(&path)?;
        self.last_generation = Some(checkpoint.generation);
        log::debug!("Checkpoint saved: {}", path);

        self.cleanup()?;

        Ok(path)
    }

    fn checkpoint_files(&self) -> std::io::Result<Vec<std::fs::DirEntry>> {
        Ok(std::fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(PERIODIC_PREFIX))
            .collect())
    }

    /// Remove old checkpoints beyond max limit
    fn cleanup(&self) -> Result<(), CheckpointError> {
        let mut checkpoints = self.checkpoint_files()?;

        if checkpoints.len() > self.max_checkpoints {
            // Zero-padded names sort by generation
            checkpoints.sort_by_key(|e| e.file_name());

            let to_remove = checkpoints.len() - self.max_checkpoints;
            for entry in checkpoints.into_iter().take(to_remove) {
                std::fs::remove_file(entry.path())?;
            }
        }

        Ok(())
    }

    /// Find latest checkpoint in directory
    pub fn find_latest(&self) -> Option<String> {
        self.checkpoint_files()
            .ok()?
            .into_iter()
            .max_by_key(|e| e.file_name())
            .map(|e| e.path().to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackConfig;
    use crate::track::Vec2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn create_test_checkpoint(generation: u32) -> Checkpoint {
        let config = Config::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let track = Track::arc(Vec2::new(200.0, 200.0), Vec2::new(150.0, 100.0), 180.0, TrackConfig::default());
        let controllers = (0..3)
            .map(|_| Controller::random(config.n_inputs(), config.neural.n_hidden, config.neural.n_outputs, &mut rng))
            .collect();
        Checkpoint::new(generation, config, track, controllers, Some(480), 12345)
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_checkpoint.bin");
        let checkpoint = create_test_checkpoint(7);

        checkpoint.save(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();

        assert_eq!(loaded.generation, 7);
        assert_eq!(loaded.controllers, checkpoint.controllers);
        assert_eq!(loaded.track.points(), checkpoint.track.points());
        assert_eq!(loaded.fastest_all_time, Some(480));
        assert_eq!(loaded.random_seed, 12345);
    }

    #[test]
    fn test_invalid_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.bin");
        std::fs::write(&path, b"JUNKJUNKJUNK").unwrap();

        match Checkpoint::load(&path) {
            Err(CheckpointError::InvalidFormat(_)) => {}
            other => panic!("expected invalid format, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.bin");
        let mut checkpoint = create_test_checkpoint(1);
        checkpoint.version = 99;
        checkpoint.save(&path).unwrap();

        match Checkpoint::load(&path) {
            Err(CheckpointError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, Checkpoint::VERSION);
                assert_eq!(found, 99);
            }
            other => panic!("expected version mismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_invalid_config_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_config.bin");
        let mut checkpoint = create_test_checkpoint(2);
        checkpoint.config.evolution.mutation_strength = f64::NAN;
        checkpoint.save(&path).unwrap();

        match Checkpoint::load(&path) {
            Err(CheckpointError::InvalidFormat(msg)) => assert!(msg.contains("mutation_strength")),
            other => panic!("expected invalid format, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_checkpoint_size() {
        let size = create_test_checkpoint(0).size_bytes();
        assert!(size > 0);
        assert!(size < 1_000_000);
    }

    #[test]
    fn test_manager_retention() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("ckpt").to_string_lossy().to_string();
        let mut manager = CheckpointManager::new(base, 5, 2);

        assert!(!manager.should_save(0));
        assert!(!manager.should_save(3));
        assert!(manager.should_save(5));

        for generation in [5, 10, 15] {
            manager.save(&create_test_checkpoint(generation)).unwrap();
        }
        assert!(!manager.should_save(15));

        let remaining = manager.checkpoint_files().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(manager.find_latest(), Some(manager.checkpoint_path(15)));
    }

    #[test]
    fn test_final_checkpoint_outside_retention() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();
        let mut manager = CheckpointManager::new(base, 1, 2);

        create_test_checkpoint(99).save(dir.path().join(FINAL_CHECKPOINT)).unwrap();
        for generation in [1, 2, 3] {
            manager.save(&create_test_checkpoint(generation)).unwrap();
        }

        assert!(dir.path().join(FINAL_CHECKPOINT).exists());
        assert_eq!(manager.checkpoint_files().unwrap().len(), 2);
        assert_eq!(manager.find_latest(), Some(manager.checkpoint_path(3)));
    }
}
