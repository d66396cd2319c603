//! Causal chain walking.

use core::fmt;

use crate::{
    fault::Fault,
    report::{ChainLink, Relation},
};

/// The most links a chain holds.
pub const MAX_CHAIN_LENGTH: usize = 10;

/// Steps from `fault` to the next fault in its chain.
///
/// The explicit cause wins over the context. A suppressed context ends the
/// chain.
fn next_link(fault: &Fault) -> Option<(Relation, &Fault)> {
    if let Some(cause) = fault.cause() {
        return Some((Relation::CausedBy, cause));
    }
    match fault.context() {
        Some(context) if !fault.is_context_suppressed() => Some((Relation::ContextFor, context)),
        Some(context) => {
            tracing::trace!(
                suppressed = %context,
                "chain traversal stopped at suppressed context"
            );
            None
        }
        None => None,
    }
}

/// Walks the chain starting at `fault`, keeping at most
/// [`MAX_CHAIN_LENGTH`] links.
///
/// The `relation` of link `i` names the edge to link `i + 1`.
pub fn walk_chain(fault: &Fault) -> Vec<ChainLink> {
    let mut links = Vec::new();
    let mut current = Some(fault);

    while let Some(fault) = current {
        if links.len() == MAX_CHAIN_LENGTH {
            break;
        }
        let next = next_link(fault);
        links.push(ChainLink {
            kind: fault.kind().name().to_string(),
            message: fault.message().to_string(),
            index: links.len(),
            is_original: links.is_empty(),
            relation: next.map(|(relation, _)| relation),
            trace: own_trace(fault),
        });
        current = next.map(|(_, fault)| fault);
    }

    links
}

/// The text of a fault's own trace, or `None` if nothing is known about
/// where it was thrown.
fn own_trace(fault: &Fault) -> Option<String> {
    (fault.trace().is_some() || fault.site().is_some()).then(|| FaultTrace(fault).to_string())
}

/// A fault with the frames it was thrown from.
struct FaultTrace<'a>(&'a Fault);

impl fmt::Display for FaultTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fault = self.0;
        writeln!(f, "{fault}")?;
        if let Some(trace) = fault.trace() {
            write!(f, "{trace}")
        } else if let Some(site) = fault.site() {
            writeln!(
                f,
                "   at {} ({}:{})",
                fault.function().unwrap_or("<unknown>"),
                site.file,
                site.line
            )
        } else {
            Ok(())
        }
    }
}

/// The text form of the whole chain, used as the report's raw trace.
pub struct RawTrace<'a>(pub &'a Fault);

impl fmt::Display for RawTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = Some(self.0);
        let mut length = 0;
        while let Some(fault) = current {
            if length == MAX_CHAIN_LENGTH {
                break;
            }
            write!(f, "{}", FaultTrace(fault))?;
            length += 1;

            current = match next_link(fault) {
                Some((Relation::CausedBy, cause)) => {
                    f.write_str("\ncaused by: ")?;
                    Some(cause)
                }
                Some((Relation::ContextFor, context)) => {
                    f.write_str("\nwhile handling: ")?;
                    Some(context)
                }
                None => None,
            };
        }
        Ok(())
    }
}
