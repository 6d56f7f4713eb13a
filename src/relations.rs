use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::token::{GramSet, Token};
use crate::tree::ParseTree;

/// Opaque user-supplied agreement test over two grammeme sets
pub type CustomRelation = Arc<dyn Fn(&GramSet, &GramSet) -> bool + Send + Sync>;

lazy_static! {
  static ref GENDERS: Vec<&'static str> = vec!["masc", "femn", "neut"];
  static ref CASES: Vec<&'static str> = vec![
    "nomn", "gent", "datv", "accs", "ablt", "loct", "voct", "gen2", "acc2", "loc2",
  ];
}

/// A two-argument predicate over grammeme sets, attached to a rule and
/// checked by the post-hoc validator. Anchors tagged with the same relation
/// must agree pairwise.
#[derive(Clone)]
pub enum Relation {
  Gender,
  Number,
  Case,
  Gnc,
  Custom(CustomRelation),
}

/// Grouping key: built-in relations group by variant, custom ones by
/// function identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKey {
  Gender,
  Number,
  Case,
  Gnc,
  Custom(usize),
}

impl Relation {
  pub fn agrees(&self, a: &GramSet, b: &GramSet) -> bool {
    match self {
      Self::Gender => gender_agrees(a, b),
      Self::Number => number_agrees(a, b),
      Self::Case => case_agrees(a, b),
      Self::Gnc => gender_agrees(a, b) && number_agrees(a, b) && case_agrees(a, b),
      Self::Custom(f) => f(a, b),
    }
  }

  pub fn key(&self) -> RelationKey {
    match self {
      Self::Gender => RelationKey::Gender,
      Self::Number => RelationKey::Number,
      Self::Case => RelationKey::Case,
      Self::Gnc => RelationKey::Gnc,
      Self::Custom(f) => RelationKey::Custom(Arc::as_ptr(f) as *const () as usize),
    }
  }
}

impl fmt::Debug for Relation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Gender => write!(f, "gender"),
      Self::Number => write!(f, "number"),
      Self::Case => write!(f, "case"),
      Self::Gnc => write!(f, "gnc"),
      Self::Custom(_) => write!(f, "custom(..)"),
    }
  }
}

/// Either side gender-fixed (`GNdr`) agrees with anything; two plurals
/// agree; otherwise the sides must share a gender, with `ms-f` standing in
/// for either masc or femn.
pub fn gender_agrees(a: &GramSet, b: &GramSet) -> bool {
  if a.contains("GNdr") || b.contains("GNdr") {
    return true;
  }
  if a.contains("plur") && b.contains("plur") {
    return true;
  }
  if GENDERS.iter().any(|g| a.contains(*g) && b.contains(*g)) {
    return true;
  }
  let common_pair =
    |x: &GramSet, y: &GramSet| x.contains("ms-f") && (y.contains("masc") || y.contains("femn"));
  common_pair(a, b) || common_pair(b, a)
}

/// Both singular (singularia tantum included) or both plural (pluralia
/// tantum included)
pub fn number_agrees(a: &GramSet, b: &GramSet) -> bool {
  let sing = |s: &GramSet| s.contains("sing") || s.contains("Sgtm");
  let plur = |s: &GramSet| s.contains("plur") || s.contains("Pltm");
  (sing(a) && sing(b)) || (plur(a) && plur(b))
}

/// Either side case-fixed (`Fixd`) agrees; otherwise the case sets must
/// intersect
pub fn case_agrees(a: &GramSet, b: &GramSet) -> bool {
  if a.contains("Fixd") || b.contains("Fixd") {
    return true;
  }
  CASES.iter().any(|c| a.contains(*c) && b.contains(*c))
}

pub fn gnc_agrees(a: &GramSet, b: &GramSet) -> bool {
  gender_agrees(a, b) && number_agrees(a, b) && case_agrees(a, b)
}

/// Collects `(relation, anchor token)` pairs from a match tree: one per
/// rule node carrying a relation, anchored at the first leaf under the
/// node's main subtree.
fn collect_anchors(tree: &ParseTree, out: &mut Vec<(Relation, Token)>) {
  if let ParseTree::Node { rule, production, children } = tree {
    if let Some(relation) = rule.relation() {
      let main = rule.production(*production).main;
      if let Some(anchor) = children.get(main).and_then(first_leaf) {
        out.push((relation, anchor.clone()));
      }
    }
    for child in children {
      collect_anchors(child, out);
    }
  }
}

fn first_leaf(tree: &ParseTree) -> Option<&Token> {
  match tree {
    ParseTree::Leaf(t) => Some(t),
    ParseTree::Node { children, .. } => children.iter().find_map(first_leaf),
  }
}

/// Validates every agreement group of a match tree.
///
/// Anchors are grouped by relation identity; a group holds iff for every
/// pair of distinct tokens some pair of their forms satisfies the relation.
/// The check is existential: it does not constrain the form sets, so later
/// inflection may still pick a form that did not participate here.
pub fn validate(tree: &ParseTree) -> bool {
  let mut anchors = Vec::new();
  collect_anchors(tree, &mut anchors);

  let mut groups: HashMap<RelationKey, (Relation, Vec<Token>)> = HashMap::new();
  for (relation, token) in anchors {
    groups
      .entry(relation.key())
      .or_insert_with(|| (relation.clone(), Vec::new()))
      .1
      .push(token);
  }

  groups.values().all(|(relation, tokens)| {
    tokens.iter().enumerate().all(|(i, a)| {
      tokens.iter().enumerate().all(|(j, b)| {
        i == j
          || a
            .forms
            .iter()
            .any(|fa| b.forms.iter().any(|fb| relation.agrees(&fa.grams, &fb.grams)))
      })
    })
  })
}
