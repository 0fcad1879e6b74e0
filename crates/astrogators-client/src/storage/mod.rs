/*
[INPUT]:  Anonymous user preferences
[OUTPUT]: Durable local preference storage
[POS]:    Storage layer - data kept on this machine only
[UPDATE]: When adding new locally persisted preferences
*/

pub mod ally_codes;

pub use ally_codes::AllyCodeStorage;
