//! Transactional helpers (spec §4.5): `begin → body → commit`, with
//! `rollback` on any error path, mapping the tri-state driver outcome
//! onto a step outcome the caller can act on without repeating the
//! DOWN/FAIL dance at every call site.

use nodewarden_ports::{DbError, Transaction};

use crate::error::CoordinatorError;

/// The result of attempting one transactional step.
pub enum StepOutcome<T> {
    /// The transaction committed; the loop may act on `T`.
    Committed(T),
    /// The database was DOWN at begin, commit, or during the body; the
    /// step is abandoned with no state change, to be retried next tick.
    Down,
}

/// Runs `body` inside one transaction against `db`, committing on
/// success and rolling back on any `Down` outcome from the body itself.
/// A `Fail` outcome at any point is terminal and is surfaced as an
/// error for the caller to escalate into `HaStatus::Error`.
pub fn run_transaction<T>(
    db: &dyn nodewarden_ports::Database,
    body: impl FnOnce(&mut dyn Transaction) -> Result<T, DbError>,
) -> Result<StepOutcome<T>, CoordinatorError> {
    let mut tx = match db.begin() {
        Ok(tx) => tx,
        Err(DbError::Down) => return Ok(StepOutcome::Down),
        Err(DbError::Fail(msg)) => return Err(CoordinatorError::Database(DbError::Fail(msg))),
    };

    match body(tx.as_mut()) {
        Ok(value) => match tx.commit() {
            Ok(()) => Ok(StepOutcome::Committed(value)),
            Err(DbError::Down) => Ok(StepOutcome::Down),
            Err(DbError::Fail(msg)) => Err(CoordinatorError::Database(DbError::Fail(msg))),
        },
        Err(DbError::Down) => {
            let _ = tx.rollback();
            Ok(StepOutcome::Down)
        }
        Err(DbError::Fail(msg)) => {
            let _ = tx.rollback();
            Err(CoordinatorError::Database(DbError::Fail(msg)))
        }
    }
}
