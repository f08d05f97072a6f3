//! The production grammar mapping genomes onto behaviour trees.

use std::collections::{HashMap, HashSet};

use gaggle_behavior::BehaviorNode;
use serde::{Deserialize, Serialize};

use crate::GeneticsError;

/// Composite node kind a production may instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositeKind {
    Selector,
    Sequence,
}

/// One alternative on a grammar symbol's right-hand side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Production {
    /// A behaviour-node name (or, in parameter position, a name fragment).
    Terminal(String),
    /// Expand another symbol in place.
    Alias(String),
    /// Instantiate the node named `{kind}_{fragment}`, where the fragment
    /// is resolved from the parameter symbol's productions.
    NodeParam { kind: String, param: String },
    /// Instantiate a composite and expand each child symbol beneath it.
    Composite {
        kind: CompositeKind,
        children: Vec<String>,
    },
    /// Expand each symbol in order, splicing all results into the parent.
    /// Self-reference here yields the "zero-or-more" chains.
    Repeat(Vec<String>),
}

impl Production {
    #[must_use]
    pub fn terminal(name: &str) -> Self {
        Self::Terminal(name.to_string())
    }

    #[must_use]
    pub fn alias(symbol: &str) -> Self {
        Self::Alias(symbol.to_string())
    }

    #[must_use]
    pub fn node_param(kind: &str, param: &str) -> Self {
        Self::NodeParam {
            kind: kind.to_string(),
            param: param.to_string(),
        }
    }

    #[must_use]
    pub fn composite(kind: CompositeKind, children: &[&str]) -> Self {
        Self::Composite {
            kind,
            children: children.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn repeat(symbols: &[&str]) -> Self {
        Self::Repeat(symbols.iter().map(ToString::to_string).collect())
    }
}

/// Immutable symbol → productions table with a designated start symbol.
///
/// Production order within a rule is load-bearing: decoding selects by
/// `codon % production_count`. Build freely, then [`Grammar::validate`]
/// before use; a validated grammar decodes any non-empty genome.
#[derive(Clone, Debug, PartialEq)]
pub struct Grammar {
    start: String,
    rules: HashMap<String, Vec<Production>>,
}

impl Grammar {
    /// An empty grammar rooted at `start`; populate it with [`Grammar::rule`].
    #[must_use]
    pub fn empty(start: &str) -> Self {
        Self {
            start: start.to_string(),
            rules: HashMap::new(),
        }
    }

    /// Install (or replace) the productions of `symbol`.
    pub fn rule(&mut self, symbol: &str, productions: Vec<Production>) {
        self.rules.insert(symbol.to_string(), productions);
    }

    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    #[must_use]
    pub fn productions(&self, symbol: &str) -> Option<&[Production]> {
        self.rules.get(symbol).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.rules.contains_key(symbol)
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.rules.len()
    }

    /// The foraging/maintenance grammar.
    ///
    /// Stitches PPA selectors out of postcondition/precondition/constraint
    /// chains and the five motor actions, parameterised over site-like
    /// landmarks (`sobjects`) and carriable resources (`dobjects`).
    #[must_use]
    pub fn standard() -> Self {
        use CompositeKind::{Selector, Sequence};

        let mut grammar = Self::empty("root");
        grammar.rule(
            "root",
            vec![Production::alias("sequence"), Production::alias("selector")],
        );
        grammar.rule(
            "sequence",
            vec![
                Production::composite(Sequence, &["ppa"]),
                Production::composite(Sequence, &["root", "root"]),
                Production::composite(Sequence, &["sequence", "root"]),
            ],
        );
        grammar.rule(
            "selector",
            vec![
                Production::composite(Selector, &["ppa"]),
                Production::composite(Selector, &["root", "root"]),
                Production::composite(Selector, &["selector", "root"]),
            ],
        );
        grammar.rule(
            "ppa",
            vec![Production::composite(
                Selector,
                &["postconditions", "ppasequence"],
            )],
        );
        grammar.rule(
            "postconditions",
            vec![
                Production::alias("successnode"),
                Production::alias("ppa"),
                Production::composite(Sequence, &["postcondition"]),
            ],
        );
        grammar.rule(
            "postcondition",
            vec![
                Production::repeat(&["postcondition", "postconditiont"]),
                Production::alias("postconditiont"),
            ],
        );
        grammar.rule(
            "postconditiont",
            vec![
                Production::node_param("NeighbourObjects", "objects"),
                Production::node_param("NeighbourObjects", "sobjects"),
                Production::node_param("IsCarrying", "dobjects"),
                Production::node_param("NeighbourObjects", "dobjects"),
                Production::node_param("DidAvoid", "sobjects"),
                Production::node_param("IsVisitedBefore", "sobjects"),
            ],
        );
        grammar.rule(
            "ppasequence",
            vec![
                Production::composite(Sequence, &["preconditions", "action"]),
                Production::composite(Sequence, &["constraints", "action"]),
                Production::composite(Sequence, &["preconditions", "constraints", "action"]),
            ],
        );
        grammar.rule(
            "preconditions",
            vec![Production::composite(Sequence, &["precondition"])],
        );
        grammar.rule(
            "precondition",
            vec![
                Production::repeat(&["precondition", "preconditiont"]),
                Production::alias("preconditiont"),
            ],
        );
        grammar.rule(
            "preconditiont",
            vec![
                Production::node_param("IsDroppable", "sobjects"),
                Production::node_param("NeighbourObjects", "objects"),
                Production::node_param("IsVisitedBefore", "sobjects"),
                Production::node_param("NeighbourObjectsInvert", "objects"),
                Production::node_param("IsVisitedBeforeInvert", "sobjects"),
                Production::node_param("IsCarrying", "dobjects"),
                Production::node_param("IsCarryingInvert", "dobjects"),
            ],
        );
        grammar.rule(
            "constraints",
            vec![Production::composite(Sequence, &["constraint"])],
        );
        grammar.rule(
            "constraint",
            vec![
                Production::repeat(&["constraint", "constraintt"]),
                Production::alias("constraintt"),
            ],
        );
        grammar.rule(
            "constraintt",
            vec![
                Production::terminal("CanMove"),
                Production::node_param("IsCarryable", "dobjects"),
                Production::node_param("IsDroppable", "sobjects"),
            ],
        );
        grammar.rule(
            "action",
            vec![
                Production::node_param("MoveTowards", "sobjects"),
                Production::terminal("Explore"),
                Production::node_param("CompositeCarry", "dobjects"),
                Production::node_param("CompositeDrop", "dobjects"),
                Production::node_param("MoveAway", "sobjects"),
            ],
        );
        grammar.rule(
            "objects",
            vec![Production::alias("sobjects"), Production::alias("dobjects")],
        );
        grammar.rule(
            "sobjects",
            vec![Production::terminal("Site"), Production::terminal("Hub")],
        );
        grammar.rule(
            "dobjects",
            vec![Production::terminal("Food"), Production::terminal("Debris")],
        );
        grammar.rule("successnode", vec![Production::terminal("Success")]);
        grammar
    }

    /// Walk every rule reachable from the start symbol and reject the
    /// configuration defects decoding would otherwise hit: missing symbols,
    /// empty rules, unknown terminal names, and parameter symbols that do
    /// not resolve to instantiable fragments.
    pub fn validate(&self) -> Result<(), GeneticsError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: Vec<&str> = vec![self.start.as_str()];
        let mut param_uses: Vec<(&str, &str)> = Vec::new();

        while let Some(symbol) = queue.pop() {
            if !visited.insert(symbol) {
                continue;
            }
            let productions = self
                .productions(symbol)
                .ok_or_else(|| GeneticsError::UnknownSymbol(symbol.to_string()))?;
            if productions.is_empty() {
                return Err(GeneticsError::EmptyProductions(symbol.to_string()));
            }
            for production in productions {
                match production {
                    Production::Terminal(name) => {
                        if BehaviorNode::from_terminal(name).is_none() {
                            return Err(GeneticsError::UnknownTerminal(name.clone()));
                        }
                    }
                    Production::Alias(next) => queue.push(next),
                    Production::NodeParam { kind, param } => param_uses.push((kind, param)),
                    Production::Composite { children, .. } => {
                        queue.extend(children.iter().map(String::as_str));
                    }
                    Production::Repeat(symbols) => {
                        queue.extend(symbols.iter().map(String::as_str));
                    }
                }
            }
        }

        for (kind, param) in param_uses {
            let fragments = self.fragments(param)?;
            for fragment in fragments {
                let name = format!("{kind}_{fragment}");
                if BehaviorNode::from_terminal(&name).is_none() {
                    return Err(GeneticsError::UnknownTerminal(name));
                }
            }
        }
        Ok(())
    }

    /// Every terminal fragment reachable from a parameter symbol through
    /// alias hops. Errors if the closure contains a non-alias, non-terminal
    /// production or never reaches a fragment.
    fn fragments(&self, param: &str) -> Result<Vec<&str>, GeneticsError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: Vec<&str> = vec![param];
        let mut fragments = Vec::new();

        while let Some(symbol) = queue.pop() {
            if !visited.insert(symbol) {
                continue;
            }
            let productions = self
                .productions(symbol)
                .ok_or_else(|| GeneticsError::UnknownSymbol(symbol.to_string()))?;
            if productions.is_empty() {
                return Err(GeneticsError::EmptyProductions(symbol.to_string()));
            }
            for production in productions {
                match production {
                    Production::Terminal(fragment) => fragments.push(fragment.as_str()),
                    Production::Alias(next) => queue.push(next),
                    _ => return Err(GeneticsError::MalformedParameter(symbol.to_string())),
                }
            }
        }

        if fragments.is_empty() {
            return Err(GeneticsError::MalformedParameter(param.to_string()));
        }
        Ok(fragments)
    }
}
