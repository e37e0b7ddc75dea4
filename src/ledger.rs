//! Balance ledger
//!
//! Balances, allowances and the frozen set. Every mutation validates first and
//! writes last, so a failed call leaves the ledger untouched. Capability checks
//! are the caller's job; the ledger only enforces numeric and frozen-account
//! rules.

use std::collections::{HashMap, HashSet};

use crate::error::{PointsError, Result};
use crate::models::{Amount, Identity};

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<Identity, Amount>,
    /// (owner, spender) -> remaining allowance
    allowances: HashMap<(Identity, Identity), Amount>,
    frozen: HashSet<Identity>,
    total_supply: Amount,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, id: Identity) -> Amount {
        self.balances.get(&id).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: Identity, spender: Identity) -> Amount {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    pub fn is_frozen(&self, id: Identity) -> bool {
        self.frozen.contains(&id)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Non-zero balances, sorted by identity
    pub fn accounts(&self) -> Vec<(Identity, Amount)> {
        let mut accounts: Vec<_> = self.balances.iter().map(|(id, b)| (*id, *b)).collect();
        accounts.sort();
        accounts
    }

    /// Create `amount` new points in `to`'s account
    pub fn mint(&mut self, to: Identity, amount: Amount) -> Result<Amount> {
        if to.is_null() {
            return Err(PointsError::ZeroAddress);
        }
        self.ensure_not_frozen(to)?;

        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(PointsError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(PointsError::Overflow)?;

        self.total_supply = supply;
        self.set_balance(to, balance);
        Ok(balance)
    }

    /// Destroy `amount` points from `from`'s own account
    pub fn burn(&mut self, from: Identity, amount: Amount) -> Result<Amount> {
        self.ensure_not_frozen(from)?;

        let balance = self.debit(from, amount)?;
        // supply >= every balance, so this cannot fail once the debit passed
        let supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(PointsError::Overflow)?;

        self.total_supply = supply;
        self.set_balance(from, balance);
        Ok(balance)
    }

    /// Move points from `from` to `to`
    pub fn transfer(&mut self, from: Identity, to: Identity, amount: Amount) -> Result<()> {
        if to.is_null() {
            return Err(PointsError::ZeroAddress);
        }
        self.ensure_not_frozen(from)?;
        self.ensure_not_frozen(to)?;
        self.move_balance(from, to, amount)
    }

    /// Move points out of `owner`'s account on their behalf, spending `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        spender: Identity,
        owner: Identity,
        to: Identity,
        amount: Amount,
    ) -> Result<()> {
        if to.is_null() {
            return Err(PointsError::ZeroAddress);
        }
        self.ensure_not_frozen(owner)?;
        self.ensure_not_frozen(to)?;

        let available = self.allowance(owner, spender);
        let remaining = available
            .checked_sub(amount)
            .ok_or(PointsError::InsufficientAllowance {
                owner,
                spender,
                available,
                required: amount,
            })?;

        self.move_balance(owner, to, amount)?;
        self.set_allowance(owner, spender, remaining);
        Ok(())
    }

    /// Set (not add to) the amount `spender` may move out of `owner`'s account
    pub fn approve_allowance(
        &mut self,
        owner: Identity,
        spender: Identity,
        amount: Amount,
    ) -> Result<()> {
        if spender.is_null() {
            return Err(PointsError::ZeroAddress);
        }
        self.set_allowance(owner, spender, amount);
        Ok(())
    }

    pub fn freeze(&mut self, id: Identity) -> Result<()> {
        if !self.frozen.insert(id) {
            return Err(PointsError::AlreadyFrozen(id));
        }
        Ok(())
    }

    pub fn unfreeze(&mut self, id: Identity) -> Result<()> {
        if !self.frozen.remove(&id) {
            return Err(PointsError::NotFrozen(id));
        }
        Ok(())
    }

    pub(crate) fn ensure_not_frozen(&self, id: Identity) -> Result<()> {
        if self.is_frozen(id) {
            return Err(PointsError::FrozenAccount(id));
        }
        Ok(())
    }

    fn debit(&self, from: Identity, amount: Amount) -> Result<Amount> {
        let available = self.balance_of(from);
        available
            .checked_sub(amount)
            .ok_or(PointsError::InsufficientBalance {
                account: from,
                available,
                required: amount,
            })
    }

    fn move_balance(&mut self, from: Identity, to: Identity, amount: Amount) -> Result<()> {
        let from_balance = self.debit(from, amount)?;
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(PointsError::Overflow)?;

        self.set_balance(from, from_balance);
        self.set_balance(to, to_balance);
        Ok(())
    }

    fn set_balance(&mut self, id: Identity, amount: Amount) {
        if amount == 0 {
            self.balances.remove(&id);
        } else {
            self.balances.insert(id, amount);
        }
    }

    fn set_allowance(&mut self, owner: Identity, spender: Identity, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_of_balances(ledger: &Ledger) -> Amount {
        ledger.accounts().iter().map(|(_, b)| b).sum()
    }

    fn funded(amount: Amount) -> (Ledger, Identity) {
        let mut ledger = Ledger::new();
        let id = Identity::new();
        ledger.mint(id, amount).unwrap();
        (ledger, id)
    }

    #[test]
    fn test_mint_increases_balance_and_supply() {
        let (mut ledger, id) = funded(100);
        assert_eq!(ledger.balance_of(id), 100);
        assert_eq!(ledger.total_supply(), 100);

        assert_eq!(ledger.mint(id, 50).unwrap(), 150);
        assert_eq!(ledger.total_supply(), 150);
    }

    #[test]
    fn test_mint_to_null_identity() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.mint(Identity::NULL, 10), Err(PointsError::ZeroAddress));
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn test_mint_overflow() {
        let (mut ledger, id) = funded(Amount::MAX);
        let other = Identity::new();

        assert_eq!(ledger.mint(other, 1), Err(PointsError::Overflow));
        assert_eq!(ledger.balance_of(other), 0);
        assert_eq!(ledger.balance_of(id), Amount::MAX);
        assert_eq!(ledger.total_supply(), Amount::MAX);
    }

    #[test]
    fn test_burn() {
        let (mut ledger, id) = funded(100);
        assert_eq!(ledger.burn(id, 40).unwrap(), 60);
        assert_eq!(ledger.total_supply(), 60);

        let err = ledger.burn(id, 61).unwrap_err();
        assert!(matches!(
            err,
            PointsError::InsufficientBalance {
                available: 60,
                required: 61,
                ..
            }
        ));
        assert_eq!(ledger.balance_of(id), 60);
    }

    #[test]
    fn test_burn_everything_removes_account() {
        let (mut ledger, id) = funded(10);
        ledger.burn(id, 10).unwrap();
        assert!(ledger.accounts().is_empty());
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn test_transfer() {
        let (mut ledger, from) = funded(100);
        let to = Identity::new();

        ledger.transfer(from, to, 30).unwrap();
        assert_eq!(ledger.balance_of(from), 70);
        assert_eq!(ledger.balance_of(to), 30);
        assert_eq!(sum_of_balances(&ledger), ledger.total_supply());
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let (mut ledger, from) = funded(10);
        let to = Identity::new();

        assert!(matches!(
            ledger.transfer(from, to, 11),
            Err(PointsError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.balance_of(from), 10);
        assert_eq!(ledger.balance_of(to), 0);
    }

    #[test]
    fn test_transfer_to_self_is_noop() {
        let (mut ledger, id) = funded(10);
        ledger.transfer(id, id, 10).unwrap();
        assert_eq!(ledger.balance_of(id), 10);
        assert!(ledger.transfer(id, id, 11).is_err());
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let (mut ledger, owner) = funded(100);
        let spender = Identity::new();
        let to = Identity::new();

        ledger.approve_allowance(owner, spender, 60).unwrap();
        ledger.transfer_from(spender, owner, to, 40).unwrap();

        assert_eq!(ledger.balance_of(owner), 60);
        assert_eq!(ledger.balance_of(to), 40);
        assert_eq!(ledger.allowance(owner, spender), 20);
    }

    #[test]
    fn test_transfer_from_insufficient_allowance() {
        let (mut ledger, owner) = funded(100);
        let spender = Identity::new();
        let to = Identity::new();
        ledger.approve_allowance(owner, spender, 10).unwrap();

        let err = ledger.transfer_from(spender, owner, to, 11).unwrap_err();
        assert!(matches!(
            err,
            PointsError::InsufficientAllowance {
                available: 10,
                required: 11,
                ..
            }
        ));
        assert_eq!(ledger.allowance(owner, spender), 10);
        assert_eq!(ledger.balance_of(owner), 100);
    }

    #[test]
    fn test_transfer_from_insufficient_balance_keeps_allowance() {
        let (mut ledger, owner) = funded(5);
        let spender = Identity::new();
        let to = Identity::new();
        ledger.approve_allowance(owner, spender, 50).unwrap();

        assert!(matches!(
            ledger.transfer_from(spender, owner, to, 6),
            Err(PointsError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.allowance(owner, spender), 50);
    }

    #[test]
    fn test_approve_allowance_overwrites() {
        let mut ledger = Ledger::new();
        let owner = Identity::new();
        let spender = Identity::new();

        ledger.approve_allowance(owner, spender, 100).unwrap();
        ledger.approve_allowance(owner, spender, 5).unwrap();
        assert_eq!(ledger.allowance(owner, spender), 5);

        assert_eq!(
            ledger.approve_allowance(owner, Identity::NULL, 1),
            Err(PointsError::ZeroAddress)
        );
    }

    #[test]
    fn test_freeze_and_unfreeze() {
        let mut ledger = Ledger::new();
        let id = Identity::new();

        ledger.freeze(id).unwrap();
        assert!(ledger.is_frozen(id));
        assert_eq!(ledger.freeze(id), Err(PointsError::AlreadyFrozen(id)));

        ledger.unfreeze(id).unwrap();
        assert!(!ledger.is_frozen(id));
        assert_eq!(ledger.unfreeze(id), Err(PointsError::NotFrozen(id)));
    }

    #[test]
    fn test_frozen_account_cannot_send_or_receive() {
        let (mut ledger, alice) = funded(100);
        let bob = Identity::new();
        ledger.mint(bob, 100).unwrap();
        ledger.approve_allowance(alice, bob, 100).unwrap();

        ledger.freeze(alice).unwrap();

        assert_eq!(ledger.mint(alice, 1), Err(PointsError::FrozenAccount(alice)));
        assert_eq!(ledger.burn(alice, 1), Err(PointsError::FrozenAccount(alice)));
        assert_eq!(
            ledger.transfer(alice, bob, 1),
            Err(PointsError::FrozenAccount(alice))
        );
        assert_eq!(
            ledger.transfer(bob, alice, 1),
            Err(PointsError::FrozenAccount(alice))
        );
        assert_eq!(
            ledger.transfer_from(bob, alice, bob, 1),
            Err(PointsError::FrozenAccount(alice))
        );

        assert_eq!(ledger.balance_of(alice), 100);
        assert_eq!(ledger.balance_of(bob), 100);
        assert_eq!(ledger.total_supply(), 200);
    }

    #[test]
    fn test_supply_matches_balances_after_mixed_operations() {
        let mut ledger = Ledger::new();
        let ids: Vec<Identity> = (0..4).map(|_| Identity::new()).collect();

        for (i, id) in ids.iter().enumerate() {
            ledger.mint(*id, 100 * (i as Amount + 1)).unwrap();
        }
        ledger.transfer(ids[3], ids[0], 150).unwrap();
        ledger.burn(ids[1], 50).unwrap();
        ledger.approve_allowance(ids[2], ids[1], 70).unwrap();
        ledger.transfer_from(ids[1], ids[2], ids[0], 70).unwrap();
        let _ = ledger.transfer(ids[0], ids[1], 10_000);

        assert_eq!(sum_of_balances(&ledger), ledger.total_supply());
        assert_eq!(ledger.total_supply(), 950);
    }
}
