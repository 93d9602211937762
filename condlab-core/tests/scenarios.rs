//! Scenario tests for the condition builder against the built-in dictionary.
//!
//! 1. SMA on the left: every right type is offered and the full operator set applies
//! 2. RSI vs a constant: crossing operators disappear
//! 3. Volatility on the left: the right side is forced to a constant
//! 4. Re-normalizing an emitted payload reproduces each side's dimension

use condlab_core::condition::{ConditionBuilder, Correction};
use condlab_core::dictionary::sample_dictionary;
use condlab_core::domain::{Operand, OperandType, OperatorCode, FALLBACK_OPERATORS};
use condlab_core::editor::{conform_operand, EditorAction};
use condlab_core::normalize::{normalize_side, SideDimension};
use std::collections::HashSet;

fn set(ops: &[OperatorCode]) -> HashSet<OperatorCode> {
    ops.iter().copied().collect()
}

// ──────────────────────────────────────────────
// Scenario 1: SMA (price) on the left
// ──────────────────────────────────────────────

#[test]
fn sma_left_offers_all_types_and_operators() {
    let dict = sample_dictionary();
    let builder = ConditionBuilder::new(&dict).unwrap();

    assert_eq!(builder.left().as_indicator().unwrap().code, "SMA");
    assert_eq!(
        builder.left_side().dimension,
        SideDimension::Dimension("price".into())
    );

    let types: HashSet<OperandType> = builder.right_constraints().types.iter().copied().collect();
    assert_eq!(
        types,
        [OperandType::Const, OperandType::Price, OperandType::Indicator]
            .into_iter()
            .collect()
    );

    assert_eq!(builder.operator(), OperatorCode::Gt);
    assert_eq!(set(builder.allowed_operators()), set(&OperatorCode::ALL));
}

// ──────────────────────────────────────────────
// Scenario 2: RSI (score_0_100) vs constant
// ──────────────────────────────────────────────

#[test]
fn rsi_against_constant_drops_crossing() {
    let dict = sample_dictionary();
    let mut builder = ConditionBuilder::new(&dict).unwrap();
    builder
        .edit_left(EditorAction::SelectIndicator("RSI".into()))
        .unwrap();
    builder
        .edit_right(EditorAction::SetType(OperandType::Const))
        .unwrap();
    builder
        .edit_right(EditorAction::SetConstant(Some(30.0)))
        .unwrap();

    assert_eq!(set(builder.allowed_operators()), set(&FALLBACK_OPERATORS));
    assert!(builder.allowed_operators().iter().all(|op| !op.is_crossing()));

    let condition = builder.condition().unwrap();
    assert!(condition.is_absolute);
}

#[test]
fn rsi_against_rsi_keeps_crossing() {
    let dict = sample_dictionary();
    let mut builder = ConditionBuilder::new(&dict).unwrap();
    builder
        .edit_left(EditorAction::SelectIndicator("RSI".into()))
        .unwrap();
    builder
        .edit_right(EditorAction::SetType(OperandType::Indicator))
        .unwrap();

    assert!(builder.allowed_operators().contains(&OperatorCode::CrossesAbove));
    builder.set_operator(OperatorCode::CrossesBelow).unwrap();
    assert!(!builder.condition().unwrap().is_absolute);
}

// ──────────────────────────────────────────────
// Scenario 3: volatility on the left
// ──────────────────────────────────────────────

#[test]
fn volatility_left_forces_constant() {
    let dict = sample_dictionary();
    let mut builder = ConditionBuilder::new(&dict).unwrap();
    builder
        .set_operator(OperatorCode::CrossesAbove)
        .unwrap();
    builder
        .edit_left(EditorAction::SelectIndicator("ATR".into()))
        .unwrap();

    assert_eq!(builder.right_constraints().types, vec![OperandType::Const]);
    assert_eq!(builder.right().operand_type(), OperandType::Const);
    assert_eq!(set(builder.allowed_operators()), set(&FALLBACK_OPERATORS));
    assert_eq!(builder.operator(), OperatorCode::Gt);

    let corrections = builder.corrections();
    assert_eq!(corrections.len(), 2);
    assert!(matches!(corrections[0], Correction::RightReset { .. }));
    assert!(matches!(corrections[1], Correction::OperatorReset { .. }));
}

// ──────────────────────────────────────────────
// Scenario 4: payload round trip
// ──────────────────────────────────────────────

#[test]
fn payload_renormalizes_to_same_dimensions() {
    let dict = sample_dictionary();
    let mut builder = ConditionBuilder::new(&dict).unwrap();
    builder
        .edit_left(EditorAction::SelectIndicator("BBANDS".into()))
        .unwrap();
    builder
        .edit_left(EditorAction::SetOutput("lower".into()))
        .unwrap();
    builder
        .edit_right(EditorAction::SetPriceField("Close".into()))
        .unwrap();
    builder.set_operator(OperatorCode::CrossesAbove).unwrap();

    let condition = builder.condition().unwrap();
    let left = conform_operand(&dict, &Operand::from(&condition.left_operand));
    let right = conform_operand(&dict, &Operand::from(&condition.right_operand));

    assert_eq!(normalize_side(&dict, &left).dimension, builder.left_side().dimension);
    assert_eq!(normalize_side(&dict, &right).dimension, builder.right_side().dimension);
    assert_eq!(&left, builder.left());
}
