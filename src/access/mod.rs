use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::identity::Address;

/// Owner identity and the one-way pause switch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessControl {
    owner: Address,
    paused: bool,
}

impl AccessControl {
    /// The initializing identity becomes the owner for the lifetime of the ledger.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            paused: false,
        }
    }

    pub(crate) fn restored(owner: Address, paused: bool) -> Self {
        Self { owner, paused }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn ensure_owner(&self, caller: &Address) -> Result<(), LedgerError> {
        if *caller != self.owner {
            return Err(LedgerError::NotOwner { caller: *caller });
        }
        Ok(())
    }

    /// Runs ahead of any other validation on content mutations.
    pub fn ensure_not_paused(&self) -> Result<(), LedgerError> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    /// Returns whether this call flipped the switch.
    pub fn pause(&mut self, caller: &Address) -> Result<bool, LedgerError> {
        self.ensure_owner(caller)?;
        let flipped = !self.paused;
        self.paused = true;
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_owner_can_pause_and_pause_is_sticky() {
        let owner = Address::from_bytes([1; 20]);
        let stranger = Address::from_bytes([2; 20]);
        let mut access = AccessControl::new(owner);
        assert!(access.ensure_not_paused().is_ok());

        assert_eq!(
            access.pause(&stranger).unwrap_err(),
            LedgerError::NotOwner { caller: stranger }
        );
        assert!(!access.is_paused());

        assert!(access.pause(&owner).unwrap());
        assert!(access.is_paused());
        assert_eq!(access.ensure_not_paused().unwrap_err(), LedgerError::Paused);

        // a second pause is accepted but changes nothing
        assert!(!access.pause(&owner).unwrap());
        assert!(access.is_paused());
        assert_eq!(access.owner(), owner);
    }
}
