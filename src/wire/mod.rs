//! Wire model: envelopes and the transport seams that carry them.

mod envelope;
mod transport;

pub use envelope::{ToMaster, ToWorker, WorkerDescriptor};
pub use transport::{ChildChannel, ChildSignal, MasterLink, SpawnedChild, Spawner};
