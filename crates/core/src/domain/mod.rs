pub mod crm;
pub mod intent;
pub mod session;
pub mod slots;
