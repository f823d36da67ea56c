pub mod habit;
pub mod intent;
pub mod memory;
pub mod task;
pub mod user;

pub use habit::{HabitFilter, HabitPatch, HabitRecord, NewHabit, PromotionSource};
pub use intent::{IntentFilter, IntentKey, IntentPatch, IntentRecord, NewIntent};
pub use memory::MemoryRecord;
pub use task::TaskRecord;
pub use user::UserProfile;
