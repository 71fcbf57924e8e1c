//! Entry point implementing [`Solver`].

use crate::batch::BatchRunner;
use crate::optimizer::SinglePlateOptimizer;
use crate::pool::StrategyPool;
use platecut_core::{
    BatchRequest, BatchResult, Config, Container, Error, Piece, ProgressCallback, Result,
    SinglePlateResult, Solver,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Plate cutting optimizer.
///
/// Owns the strategy pool for its whole lifetime; the pool's workers are
/// joined when the cutter is dropped.
pub struct Cutter {
    config: Config,
    pool: Option<StrategyPool>,
    cancelled: Arc<AtomicBool>,
}

impl Cutter {
    /// Creates a cutter with a strategy pool sized from `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = StrategyPool::from_config(&config)?;
        log::debug!("cutter started with {} workers", pool.workers());
        Ok(Self {
            config,
            pool: Some(pool),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Creates a cutter that runs every attempt on the calling thread.
    pub fn sequential(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pool: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the strategy pool, if any.
    pub fn pool(&self) -> Option<&StrategyPool> {
        self.pool.as_ref()
    }

    fn validate_pieces(pieces: &[Piece]) -> Result<()> {
        let mut ids = HashSet::with_capacity(pieces.len());
        for piece in pieces {
            if !(piece.width > 0.0 && piece.length > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "piece {} has non-positive dimensions {}x{}",
                    piece.id, piece.width, piece.length
                )));
            }
            if !ids.insert(piece.id) {
                return Err(Error::InvalidInput(format!("duplicate piece id {}", piece.id)));
            }
        }
        Ok(())
    }

    fn run_batch(
        &self,
        request: &BatchRequest,
        callback: Option<&ProgressCallback>,
    ) -> Result<BatchResult> {
        self.cancelled.store(false, Ordering::Relaxed);
        BatchRunner::new(&self.config, self.pool.as_ref(), self.cancelled.clone())
            .run(request, callback)
    }
}

impl Solver for Cutter {
    fn optimize_single_plate(
        &self,
        container: Container,
        pieces: &[Piece],
        max_layers: usize,
    ) -> Result<SinglePlateResult> {
        container.validate()?;
        if max_layers == 0 {
            return Err(Error::InvalidLayerLimit(max_layers));
        }
        Self::validate_pieces(pieces)?;

        // Reset cancellation flag
        self.cancelled.store(false, Ordering::Relaxed);

        let optimizer =
            SinglePlateOptimizer::new(&self.config, self.pool.as_ref(), self.cancelled.clone());
        Ok(optimizer.optimize_stack(&container, pieces, max_layers))
    }

    fn optimize_batch(&self, request: &BatchRequest) -> Result<BatchResult> {
        self.run_batch(request, None)
    }

    fn optimize_batch_with_progress(
        &self,
        request: &BatchRequest,
        callback: ProgressCallback,
    ) -> Result<BatchResult> {
        self.run_batch(request, Some(&callback))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platecut_core::PieceType;

    #[test]
    fn test_rejects_bad_input_before_work() {
        let cutter = Cutter::sequential(Config::default()).unwrap();
        let pieces = vec![Piece::new(1, 1, 100.0, 100.0)];

        let err = cutter
            .optimize_single_plate(Container::new(0.0, 100.0), &pieces, 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidContainer { .. }));

        let err = cutter
            .optimize_single_plate(Container::new(100.0, 100.0), &pieces, 0)
            .unwrap_err();
        assert_eq!(err, Error::InvalidLayerLimit(0));

        let dup = vec![Piece::new(1, 1, 10.0, 10.0), Piece::new(1, 1, 10.0, 10.0)];
        let err = cutter
            .optimize_single_plate(Container::new(100.0, 100.0), &dup, 1)
            .unwrap_err();
        assert!(err.is_input_error());

        let request = BatchRequest::new(Container::new(100.0, -1.0))
            .with_piece(PieceType::new(1, 10.0, 10.0), 1);
        assert!(cutter.optimize_batch(&request).is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.good_enough_efficiency = 1.5;
        assert!(Cutter::new(config).is_err());

        let mut config = Config::default();
        config.elite_count = config.population_size;
        assert!(Cutter::new(config).is_err());

        let clamped = Config::default().with_good_enough_efficiency(1.5);
        assert!(Cutter::new(clamped).is_ok());
    }

    #[test]
    fn test_cancel_flag_is_reset_per_call() {
        let cutter = Cutter::new(Config::default().with_time_limit(30)).unwrap();
        cutter.cancel();
        let request = BatchRequest::new(Container::new(1000.0, 1000.0))
            .with_piece(PieceType::new(1, 500.0, 500.0), 4);
        let result = cutter.optimize_batch(&request).unwrap();
        assert!(!result.cancelled);
        assert!(result.all_placed());
        assert_eq!(result.plates_used(), 1);
    }
}
