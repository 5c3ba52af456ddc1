//! # Locked Account Migration Integration Tests
//!
//! Positions move from a funded company's locked account into a successor
//! ledger. Both sides must agree (the successor names its source, the
//! source enables the successor) and the sum of locked funds across both
//! ledgers never changes.

mod common;

use common::*;
use eto_core::Amount;
use eto_governance::VotingRule;
use eto_ledger::{AssetToken, LedgerError, LedgerEvent, LockedAccount};
use eto_state::EtoState;
use proptest::prelude::*;

fn successor(d: &Deployment, source: &str) -> LockedAccount {
    let mut next = LockedAccount::new(locked_config("icbm-v2"), d.clock.clone(), access_policy()).unwrap();
    next.set_controller(admin(), d.offering_address()).unwrap();
    next.set_migration_source(admin(), a(source)).unwrap();
    next
}

fn combined(d: &Deployment, next: &LockedAccount) -> Amount {
    d.locked
        .total_locked_amount()
        .checked_add(next.total_locked_amount())
        .unwrap()
}

#[test]
fn migration_moves_position_and_custody() {
    let mut d = Deployment::funded(VotingRule::NoVotingRights);
    let mut next = successor(&d, "icbm");
    d.locked.enable_migration(admin(), &next).unwrap();

    d.locked.migrate(a("alice"), a("alice"), &mut next, &mut d.asset).unwrap();
    assert!(d.locked.account(a("alice")).is_empty());
    let moved = next.account(a("alice"));
    assert_eq!(moved.locked_amount, amt(600));
    assert_eq!(moved.neumarks_due, amt(1_200));
    assert_eq!(moved.unlock_date, Some(ts(START + LOCK_PERIOD)));

    assert_eq!(combined(&d, &next), amt(1_100));
    assert_eq!(d.asset.balance_of(next.address()), amt(600));
    d.assert_consistent();
    next.check_invariants().unwrap();
    next.check_custody(&d.asset).unwrap();

    assert!(d
        .locked
        .events()
        .iter()
        .any(|e| matches!(e, LedgerEvent::InvestorMigrated { investor, .. } if *investor == a("alice"))));

    // Migrating again finds nothing to move.
    d.locked.migrate(a("alice"), a("alice"), &mut next, &mut d.asset).unwrap();
    assert_eq!(combined(&d, &next), amt(1_100));
    assert_eq!(next.account(a("alice")).locked_amount, amt(600));
}

#[test]
fn migrated_position_unlocks_from_successor_with_original_terms() {
    let mut d = Deployment::funded(VotingRule::NoVotingRights);
    let mut next = successor(&d, "icbm");
    d.locked.enable_migration(admin(), &next).unwrap();
    d.locked.migrate(a("alice"), a("alice"), &mut next, &mut d.asset).unwrap();

    // The successor follows the offering's outcome too.
    next.controller_succeeded(d.offering_address()).unwrap();
    d.at(SIGNING_START + DAY).unwrap();

    d.neumark.approve(a("alice"), next.address(), amt(1_200)).unwrap();
    next.unlock(a("alice"), a("alice"), &mut d.neumark, &mut d.asset).unwrap();
    assert_eq!(d.asset.balance_of(a("alice")), amt(540));
    assert_eq!(d.asset.balance_of(pool()), amt(60));
    assert_eq!(next.total_locked_amount(), amt(0));
    assert_eq!(d.offering.state(), EtoState::Claim);
}

#[test]
fn migration_requires_both_sides_to_agree() {
    let mut d = Deployment::funded(VotingRule::NoVotingRights);

    let mut stranger = successor(&d, "some-other-ledger");
    let err = d.locked.enable_migration(admin(), &stranger).unwrap_err();
    assert!(matches!(err, LedgerError::MigrationHandshake { .. }));

    let err = d.locked.migrate(a("alice"), a("alice"), &mut stranger, &mut d.asset).unwrap_err();
    assert!(matches!(err, LedgerError::MigrationNotEnabled));
    assert_eq!(d.locked.account(a("alice")).locked_amount, amt(600));
    d.assert_consistent();
}

#[test]
fn released_account_cannot_enable_migration() {
    let mut d = Deployment::new(1_000, 100_000);
    d.schedule().unwrap();
    d.at(START).unwrap();
    d.invest("alice", 300).unwrap();
    assert_eq!(d.at(SIGNING_START).unwrap(), EtoState::Refund);
    let controller = d.offering_address();
    d.locked.controller_failed(controller).unwrap();

    let next = successor(&d, "icbm");
    assert!(matches!(
        d.locked.enable_migration(admin(), &next).unwrap_err(),
        LedgerError::WrongState { .. }
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn locked_total_is_conserved_across_ledgers(
        positions in proptest::collection::vec((1u128..10_000, any::<bool>()), 1..8),
    ) {
        let mut d = Deployment::new(1, 1_000_000);
        d.schedule().unwrap();
        d.at(START).unwrap();

        let mut expected = Amount::ZERO;
        for (i, (ticket, _)) in positions.iter().enumerate() {
            d.invest(&format!("investor-{i}"), *ticket).unwrap();
            expected = expected.checked_add(amt(*ticket)).unwrap();
        }

        let mut next = successor(&d, "icbm");
        d.locked.enable_migration(admin(), &next).unwrap();
        for (i, (_, migrate)) in positions.iter().enumerate() {
            if *migrate {
                let investor = a(&format!("investor-{i}"));
                d.locked.migrate(investor, investor, &mut next, &mut d.asset).unwrap();
            }
            prop_assert_eq!(combined(&d, &next), expected);
        }

        let migrated = positions.iter().filter(|(_, m)| *m).count() as u64;
        prop_assert_eq!(next.total_investors(), migrated);
        prop_assert_eq!(d.locked.total_investors() + migrated, positions.len() as u64);
        d.assert_consistent();
        prop_assert!(next.check_invariants().is_ok());
        prop_assert!(next.check_custody(&d.asset).is_ok());
    }
}
