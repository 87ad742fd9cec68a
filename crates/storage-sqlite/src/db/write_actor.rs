//! Single-writer actor for the SQLite store.
//!
//! SQLite allows one writer at a time; funnelling every mutation through a
//! dedicated thread keeps writers from contending on the file lock and
//! keeps synchronous SQLite calls off the async reactor. Each job runs
//! inside one immediate transaction, so a multi-statement job commits or
//! rolls back as a unit.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::error;

use odin_core::Result;

use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Handle to the writer thread. Cheap to clone; the thread exits when the
/// last handle is dropped.
#[derive(Clone)]
pub struct WriteHandle {
    tx: std::sync::mpsc::Sender<Job>,
}

impl WriteHandle {
    /// Run a write job on the writer thread inside one immediate
    /// transaction and await its result.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let boxed: Job = Box::new(move |conn| {
            let result = run_in_transaction(conn, job);
            let _ = done_tx.send(result);
        });

        self.tx
            .send(boxed)
            .map_err(|_| odin_core::Error::connection("local writer thread is gone"))?;

        done_rx
            .await
            .map_err(|_| odin_core::Error::connection("local writer dropped the job"))?
    }
}

fn run_in_transaction<T, F>(conn: &mut SqliteConnection, job: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    diesel::sql_query("BEGIN IMMEDIATE")
        .execute(conn)
        .map_err(StorageError::from)?;

    match job(conn) {
        Ok(value) => {
            diesel::sql_query("COMMIT")
                .execute(conn)
                .map_err(StorageError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = diesel::sql_query("ROLLBACK").execute(conn) {
                error!("Rollback after failed write job also failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

/// Spawn the writer thread for a pool.
pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
    let (tx, rx) = std::sync::mpsc::channel::<Job>();

    std::thread::Builder::new()
        .name("odin-sqlite-writer".to_string())
        .spawn(move || {
            while let Ok(job) = rx.recv() {
                match pool.get() {
                    Ok(mut conn) => job(&mut conn),
                    // Dropping the job wakes the caller with a closed-channel
                    // error; the pool failure is what actually went wrong.
                    Err(e) => error!("Writer could not get a connection: {e}"),
                }
            }
        })
        .expect("failed to spawn sqlite writer thread");

    WriteHandle { tx }
}
