//! Genome-to-tree expansion.

use gaggle_behavior::BehaviorNode;

use crate::grammar::{CompositeKind, Grammar, Production};
use crate::{Genome, GeneticsError};

impl Grammar {
    /// Decode `genome` into the behaviour tree rooted at the start symbol.
    ///
    /// Productions are chosen by `codon % production_count`, advancing a
    /// wrapping cursor one codon per choice, so decoding is deterministic
    /// and consults no random state. Expansion entered deeper than
    /// `max_tree_depth` substitutes the no-op success node instead of
    /// recursing, which bounds the recursion for every genome.
    pub fn decode(
        &self,
        genome: &Genome,
        max_tree_depth: u32,
    ) -> Result<BehaviorNode, GeneticsError> {
        let mut expander = Expander {
            grammar: self,
            genome,
            cursor: 0,
            max_depth: max_tree_depth,
        };
        let mut roots = Vec::new();
        expander.expand(self.start(), 0, &mut roots)?;
        if roots.len() != 1 {
            return Err(GeneticsError::AmbiguousRoot { count: roots.len() });
        }
        Ok(roots.remove(0))
    }
}

struct Expander<'g> {
    grammar: &'g Grammar,
    genome: &'g Genome,
    cursor: usize,
    max_depth: u32,
}

impl<'g> Expander<'g> {
    /// Choose one production off `symbol` and splice the nodes it yields
    /// into `out`. Repeat productions splice several nodes; everything else
    /// splices exactly one.
    fn expand(
        &mut self,
        symbol: &str,
        depth: u32,
        out: &mut Vec<BehaviorNode>,
    ) -> Result<(), GeneticsError> {
        if depth > self.max_depth {
            out.push(BehaviorNode::Success);
            return Ok(());
        }
        match self.select(symbol)? {
            Production::Terminal(name) => {
                let node = BehaviorNode::from_terminal(name)
                    .ok_or_else(|| GeneticsError::UnknownTerminal(name.clone()))?;
                out.push(node);
            }
            Production::Alias(next) => self.expand(next, depth + 1, out)?,
            Production::NodeParam { kind, param } => {
                let fragment = self.resolve_fragment(param)?;
                let name = format!("{kind}_{fragment}");
                let node = BehaviorNode::from_terminal(&name)
                    .ok_or(GeneticsError::UnknownTerminal(name))?;
                out.push(node);
            }
            Production::Composite { kind, children } => {
                let mut nodes = Vec::new();
                for child in children {
                    self.expand(child, depth + 1, &mut nodes)?;
                }
                out.push(match kind {
                    CompositeKind::Selector => BehaviorNode::Selector(nodes),
                    CompositeKind::Sequence => BehaviorNode::Sequence(nodes),
                });
            }
            Production::Repeat(symbols) => {
                for symbol in symbols {
                    self.expand(symbol, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a parameter symbol to a terminal fragment. Every selection
    /// consumes one cursor step, alias hops included. A validated grammar's
    /// alias chains terminate; the hop budget turns a cyclic defect into an
    /// error instead of a spin.
    fn resolve_fragment(&mut self, param: &'g str) -> Result<&'g str, GeneticsError> {
        let mut symbol = param;
        for _ in 0..=self.grammar.symbol_count() {
            match self.select(symbol)? {
                Production::Terminal(fragment) => return Ok(fragment),
                Production::Alias(next) => symbol = next,
                _ => return Err(GeneticsError::MalformedParameter(symbol.to_string())),
            }
        }
        Err(GeneticsError::MalformedParameter(param.to_string()))
    }

    /// Modulo-select the next production of `symbol`, consuming one cursor
    /// step.
    fn select(&mut self, symbol: &str) -> Result<&'g Production, GeneticsError> {
        let grammar = self.grammar;
        let productions = grammar
            .productions(symbol)
            .ok_or_else(|| GeneticsError::UnknownSymbol(symbol.to_string()))?;
        if productions.is_empty() {
            return Err(GeneticsError::EmptyProductions(symbol.to_string()));
        }
        let choice = usize::from(self.genome.codon(self.cursor)) % productions.len();
        self.cursor += 1;
        Ok(&productions[choice])
    }
}
