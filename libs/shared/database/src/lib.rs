pub mod locks;
pub mod memory;
pub mod projection;
pub mod state;
pub mod store;
pub mod supabase;

pub use memory::InMemoryStore;
pub use state::AppState;
pub use store::{ClinicStore, LockKey, Relation, StoreError, StoreResult, StoreTransaction};
pub use supabase::{SupabaseClient, SupabaseStore};
