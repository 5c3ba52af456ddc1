//! # Token Collaborators
//!
//! The locked account moves custody through [`AssetToken`] and burns
//! through [`NeumarkToken`]. Token mechanics themselves live elsewhere;
//! [`TokenLedger`] is an in-memory implementation with exactly the
//! semantics the engines rely on:
//!
//! - balances and allowances with checked arithmetic,
//! - `transfer_from` consuming allowance,
//! - ERC223-style recipient check: an address registered as a contract
//!   that does not accept callbacks cannot receive tokens,
//! - approve-and-call into an [`ApprovalReceiver`].

use std::collections::BTreeMap;

use eto_core::{Address, Amount};

use crate::error::{LedgerError, TokenError};

/// ERC20-like fungible token.
pub trait AssetToken {
    /// Address of the token contract.
    fn token_address(&self) -> Address;

    /// Balance of `owner`.
    fn balance_of(&self, owner: Address) -> Amount;

    /// Amount `spender` may pull from `owner`.
    fn allowance(&self, owner: Address, spender: Address) -> Amount;

    /// Set the allowance of `spender` over `owner`'s tokens.
    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), TokenError>;

    /// Move `amount` from `from` to `to`.
    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError>;

    /// Whether `recipient` can receive tokens (plain accounts always can).
    fn accepts_callbacks(&self, recipient: Address) -> bool;
}

/// The neumark: an asset token its holders can burn.
pub trait NeumarkToken: AssetToken {
    /// Destroy `amount` of `owner`'s tokens.
    fn burn(&mut self, owner: Address, amount: Amount) -> Result<(), TokenError>;
}

/// Receiving end of approve-and-call.
pub trait ApprovalReceiver {
    /// Address the approval is granted to.
    fn receiver_address(&self) -> Address;

    /// Invoked by the neumark token right after `from` approved `amount`.
    fn receive_approval(
        &mut self,
        token: Address,
        from: Address,
        amount: Amount,
        neumark: &mut dyn NeumarkToken,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError>;
}

/// In-memory token.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    address: Address,
    symbol: String,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    /// Registered contracts and whether each accepts token callbacks.
    contracts: BTreeMap<Address, bool>,
}

impl TokenLedger {
    /// An empty token.
    pub fn new(address: Address, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            total_supply: Amount::ZERO,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            contracts: BTreeMap::new(),
        }
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Create tokens.
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<(), TokenError> {
        let supply = self.total_supply.checked_add(amount)?;
        let balance = self.balance_of(to).checked_add(amount)?;
        self.total_supply = supply;
        self.set_balance(to, balance);
        Ok(())
    }

    /// Mark `address` as a contract. Contracts that do not accept
    /// callbacks cannot receive tokens.
    pub fn register_contract(&mut self, address: Address, accepts_callbacks: bool) {
        self.contracts.insert(address, accepts_callbacks);
    }

    /// Approve `receiver` for `amount` and invoke it in the same call.
    /// The approval is restored if the receiver fails.
    pub fn approve_and_call(
        &mut self,
        owner: Address,
        receiver: &mut dyn ApprovalReceiver,
        amount: Amount,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError> {
        let spender = receiver.receiver_address();
        let previous = self.allowance(owner, spender);
        self.approve(owner, spender, amount)?;
        let token = self.address;
        if let Err(err) = receiver.receive_approval(token, owner, amount, self, asset) {
            self.set_allowance(owner, spender, previous);
            return Err(err);
        }
        Ok(())
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    fn set_balance(&mut self, owner: Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&owner);
        } else {
            self.balances.insert(owner, amount);
        }
    }
}

impl AssetToken for TokenLedger {
    fn token_address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, owner: Address) -> Amount {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), TokenError> {
        self.set_allowance(owner, spender, amount);
        Ok(())
    }

    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        if !self.accepts_callbacks(to) {
            return Err(TokenError::CallbackRejected { recipient: to });
        }
        let available = self.balance_of(from);
        let debited = available
            .checked_sub(amount)
            .map_err(|_| TokenError::InsufficientBalance {
                owner: from,
                needed: amount,
                available,
            })?;
        if from == to {
            return Ok(());
        }
        let credited = self.balance_of(to).checked_add(amount)?;
        self.set_balance(from, debited);
        self.set_balance(to, credited);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let available = self.allowance(from, spender);
        let remaining = available
            .checked_sub(amount)
            .map_err(|_| TokenError::InsufficientAllowance {
                owner: from,
                spender,
                needed: amount,
                available,
            })?;
        self.transfer(from, to, amount)?;
        self.set_allowance(from, spender, remaining);
        Ok(())
    }

    fn accepts_callbacks(&self, recipient: Address) -> bool {
        self.contracts.get(&recipient).copied().unwrap_or(true)
    }
}

impl NeumarkToken for TokenLedger {
    fn burn(&mut self, owner: Address, amount: Amount) -> Result<(), TokenError> {
        let available = self.balance_of(owner);
        let remaining = available
            .checked_sub(amount)
            .map_err(|_| TokenError::InsufficientBalance {
                owner,
                needed: amount,
                available,
            })?;
        self.total_supply = self.total_supply.checked_sub(amount)?;
        self.set_balance(owner, remaining);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::derive(label)
    }

    fn token() -> TokenLedger {
        let mut t = TokenLedger::new(addr("ether-token"), "ETH-T");
        t.mint(addr("alice"), Amount::new(100)).unwrap();
        t
    }

    #[test]
    fn transfer_moves_balance() {
        let mut t = token();
        t.transfer(addr("alice"), addr("bob"), Amount::new(30)).unwrap();
        assert_eq!(t.balance_of(addr("alice")), Amount::new(70));
        assert_eq!(t.balance_of(addr("bob")), Amount::new(30));
        assert_eq!(t.total_supply(), Amount::new(100));
    }

    #[test]
    fn transfer_beyond_balance_fails() {
        let mut t = token();
        let err = t
            .transfer(addr("alice"), addr("bob"), Amount::new(101))
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { .. }));
        assert_eq!(t.balance_of(addr("alice")), Amount::new(100));
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let mut t = token();
        t.approve(addr("alice"), addr("spender"), Amount::new(50)).unwrap();
        t.transfer_from(addr("spender"), addr("alice"), addr("bob"), Amount::new(20))
            .unwrap();
        assert_eq!(t.allowance(addr("alice"), addr("spender")), Amount::new(30));
        let err = t
            .transfer_from(addr("spender"), addr("alice"), addr("bob"), Amount::new(31))
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { .. }));
    }

    #[test]
    fn contract_without_callback_cannot_receive() {
        let mut t = token();
        t.register_contract(addr("dumb-contract"), false);
        t.register_contract(addr("pool"), true);
        assert!(!t.accepts_callbacks(addr("dumb-contract")));
        assert!(t.accepts_callbacks(addr("pool")));
        assert!(t.accepts_callbacks(addr("someone")));
        let err = t
            .transfer(addr("alice"), addr("dumb-contract"), Amount::new(1))
            .unwrap_err();
        assert_eq!(
            err,
            TokenError::CallbackRejected {
                recipient: addr("dumb-contract")
            }
        );
    }

    #[test]
    fn burn_reduces_supply() {
        let mut t = token();
        t.burn(addr("alice"), Amount::new(40)).unwrap();
        assert_eq!(t.total_supply(), Amount::new(60));
        assert!(t.burn(addr("alice"), Amount::new(61)).is_err());
    }

    #[test]
    fn mint_overflow_is_rejected() {
        let mut t = token();
        assert!(t.mint(addr("bob"), Amount::new(u128::MAX)).is_err());
        assert_eq!(t.balance_of(addr("bob")), Amount::ZERO);
    }
}
