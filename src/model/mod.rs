//! Input data model: the resolved project payload handed to the engine.

mod record;
mod report;
mod technician;

pub use record::{HazardSize, MeasurementGroup, MeasurementRecord, SpecialCase};
pub use report::{
    Clin, Contact, Customer, Hazards, Pricing, PricingModel, ReportData, Territory, User,
};
pub(crate) use report::parse_iso_date;
pub use technician::{technician_initials, Technician, TechnicianIndex};
