use crate::model::audit::DateRange;
use crate::model::ids::DentistId;

/// Session activity of one dentist over a period.
#[derive(Debug, Clone, PartialEq)]
pub struct DentistStats {
    pub dentist: DentistId,
    pub total_sessions: u32,
    pub total_patients: u32,
    pub average_duration_minutes: f64,
    pub total_duration_minutes: u32,
    pub average_increment: f64,
    pub period: DateRange,
}
