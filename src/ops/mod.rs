pub mod lse;
pub mod softtopk;
