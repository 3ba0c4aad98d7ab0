//! Managed-transaction mode for bulk work.
//!
//! A [`Batch`] holds one pooled connection with a transaction permanently
//! open. Operations issued through [`Batch::session`] join that transaction;
//! the owner decides when to [`commit`](Batch::commit). Dropping a batch
//! without [`finish`](Batch::finish) rolls back everything since the last
//! commit. If a commit cannot reopen the transaction the batch is closed and
//! every later call fails with [`Error::BatchClosed`].

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, warn};

use crate::{Error, Result, session::Session};

pub struct Batch {
  conn: PooledConnection<SqliteConnectionManager>,
  open: bool,
}

impl Batch {
  pub(crate) fn begin(conn: PooledConnection<SqliteConnectionManager>) -> Result<Self> {
    conn.execute_batch("BEGIN IMMEDIATE")?;
    Ok(Self { conn, open: true })
  }

  pub fn session(&self) -> Result<Session<'_>> {
    self.ensure_open()?;
    Ok(Session::new(&self.conn))
  }

  /// Commit everything so far and immediately open the next transaction.
  pub fn commit(&mut self) -> Result<()> {
    self.ensure_open()?;
    self.conn.execute_batch("COMMIT")?;
    self.open = false;
    self.conn.execute_batch("BEGIN IMMEDIATE")?;
    self.open = true;
    debug!("batch committed");
    Ok(())
  }

  /// Commit and release the connection.
  pub fn finish(mut self) -> Result<()> {
    self.ensure_open()?;
    self.conn.execute_batch("COMMIT")?;
    self.open = false;
    Ok(())
  }

  fn ensure_open(&self) -> Result<()> {
    if self.open { Ok(()) } else { Err(Error::BatchClosed) }
  }
}

impl Drop for Batch {
  fn drop(&mut self) {
    if self.open
      && let Err(e) = self.conn.execute_batch("ROLLBACK")
    {
      warn!("batch rollback failed: {e}");
    }
  }
}
