//! Patience-based stopping on validation accuracy

/// Outcome of recording one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Validation accuracy matched or beat the best so far; checkpoint now
    Improved,
    NotImproved,
}

/// Tracks the best validation accuracy and epochs without improvement
///
/// Ties count as improvements. Stopping requires both exhausted patience
/// and a best training accuracy of at least `min_train_acc`.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStopping {
    patience: usize,
    min_train_acc: f64,
    best_val_acc: f64,
    best_train_acc: f64,
    epochs_without_improvement: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_train_acc: f64) -> Self {
        Self::resume(patience, min_train_acc, 0.0)
    }

    /// Continue from a checkpointed best validation accuracy
    pub fn resume(patience: usize, min_train_acc: f64, best_val_acc: f64) -> Self {
        Self {
            patience,
            min_train_acc,
            best_val_acc,
            best_train_acc: 0.0,
            epochs_without_improvement: 0,
        }
    }

    pub fn record(&mut self, train_acc: f64, val_acc: f64) -> Decision {
        if train_acc >= self.best_train_acc {
            self.best_train_acc = train_acc;
        }
        if val_acc >= self.best_val_acc {
            self.best_val_acc = val_acc;
            self.epochs_without_improvement = 0;
            Decision::Improved
        } else {
            self.epochs_without_improvement += 1;
            Decision::NotImproved
        }
    }

    pub fn should_stop(&self) -> bool {
        self.epochs_without_improvement >= self.patience && self.best_train_acc >= self.min_train_acc
    }

    pub fn best_val_acc(&self) -> f64 {
        self.best_val_acc
    }

    pub fn best_train_acc(&self) -> f64 {
        self.best_train_acc
    }

    pub fn epochs_without_improvement(&self) -> usize {
        self.epochs_without_improvement
    }
}
