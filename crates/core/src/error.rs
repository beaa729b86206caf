use thiserror::Error;

use crate::model::{
    EvidenceRefError, InvalidRangeError, ParseIdError, ProgressError, SessionError,
};
use crate::role_change::RoleChangeError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Range(#[from] InvalidRangeError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    RoleChange(#[from] RoleChangeError),
    #[error(transparent)]
    Evidence(#[from] EvidenceRefError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
