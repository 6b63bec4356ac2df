use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{
    entity::{Calculation, Entity, Formular, Node},
    errors::CalcStoreError,
};

/// A parent/child pairing whose membership is kept as a singly linked chain
/// of association records in `TABLE`.
pub trait Relation {
    type Parent: Entity;
    type Child: Entity;

    /// Association table; its rows carry `parent_id`, `child_id`, `next_id`.
    const TABLE: &'static str;
    /// Name used in logs and on the command line.
    const NAME: &'static str;
}

/// Formulars of a calculation, in evaluation order.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalculationFormulars;

/// Nodes of a formular, in evaluation order.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormularNodes;

impl Relation for CalculationFormulars {
    type Parent = Calculation;
    type Child = Formular;

    const TABLE: &'static str = "calculation_formulars";
    const NAME: &'static str = "calculation-formulars";
}

impl Relation for FormularNodes {
    type Parent = Formular;
    type Child = Node;

    const TABLE: &'static str = "formular_nodes";
    const NAME: &'static str = "formular-nodes";
}

/// Runtime selector for the two relations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    CalculationFormulars,
    FormularNodes,
}

impl RelationKind {
    pub const ALL: [RelationKind; 2] = [
        RelationKind::CalculationFormulars,
        RelationKind::FormularNodes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RelationKind::CalculationFormulars => CalculationFormulars::NAME,
            RelationKind::FormularNodes => FormularNodes::NAME,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RelationKind {
    type Err = CalcStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                CalcStoreError::invalid_input(format!(
                    "unknown relation {s} (expected {} or {})",
                    CalculationFormulars::NAME,
                    FormularNodes::NAME
                ))
            })
    }
}
