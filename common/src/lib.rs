// Timestamp chain VM common library - main library exports

pub mod clock;
pub mod configuration;
pub mod crypto;
pub mod id;
pub mod status;

// Flattened re-exports
pub use self::clock::{Clock, SystemClock};
pub use self::id::{BlockId, BLOCK_ID_LEN};
pub use self::status::BlockStatus;
