//! Switchboard Domain Concerns

pub mod instances;
