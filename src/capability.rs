//! Optional collaborators (ledger, persistence) as an explicit capability.
//!
//! Call sites match on both branches instead of null-checking a handle.

use std::fmt;

pub enum Capability<T> {
    Available(T),
    Unavailable,
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(handle) => Capability::Available(handle),
            None => Capability::Unavailable,
        }
    }
}

impl<T: Clone> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Capability::Available(handle) => Capability::Available(handle.clone()),
            Capability::Unavailable => Capability::Unavailable,
        }
    }
}

impl<T> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Available(_) => write!(f, "Available"),
            Capability::Unavailable => write!(f, "Unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option() {
        let cap: Capability<u8> = Some(3).into();
        assert!(cap.is_available());
        let cap: Capability<u8> = None.into();
        assert!(!cap.is_available());
        assert_eq!(format!("{:?}", cap), "Unavailable");
    }
}
