use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("register address {0} is out of range")]
    AddressOutOfRange(u8),
    #[error("no register at address {0}")]
    NotRegistered(u8),
}
