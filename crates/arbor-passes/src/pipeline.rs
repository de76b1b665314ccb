//! Pass names and the standard pass order.

use crate::ascription::{AscribePass, ExpectedTypesPass};
use crate::constants::ConstantsPass;
use crate::disambiguate::{DisambiguatePass, Tier};
use crate::imports::ImportsPass;
use crate::members::MembersPass;
use crate::simplify::SimplifyPass;
use crate::typecheck::TypeCheckPass;
use arbor_core::scheduler::Pass;
use std::rc::Rc;
use thiserror::Error;

pub const IMPORTS: &str = "imports";
pub const DISAMBIGUATE_OUTER: &str = "disambiguate-outer";
pub const DISAMBIGUATE_SIGNATURES: &str = "disambiguate-signatures";
pub const MEMBERS: &str = "members";
pub const DISAMBIGUATE: &str = "disambiguate";
pub const CONSTANTS: &str = "constants";
pub const TYPECHECK: &str = "typecheck";
pub const EXPECTED_TYPES: &str = "expected-types";
pub const ASCRIBE: &str = "ascribe";
pub const SIMPLIFY: &str = "simplify";

pub const PASS_ORDER: [&str; 10] = [
    IMPORTS,
    DISAMBIGUATE_OUTER,
    DISAMBIGUATE_SIGNATURES,
    MEMBERS,
    DISAMBIGUATE,
    CONSTANTS,
    TYPECHECK,
    EXPECTED_TYPES,
    ASCRIBE,
    SIMPLIFY,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Unknown pass `{0}` (known passes: {known})", known = PASS_ORDER.join(", "))]
    UnknownPass(String),
}

/// Every pass, in scheduling order.
pub fn standard_passes() -> Vec<Rc<dyn Pass>> {
    vec![
        Rc::new(ImportsPass),
        Rc::new(DisambiguatePass::new(Tier::Outer)),
        Rc::new(DisambiguatePass::new(Tier::Signatures)),
        Rc::new(MembersPass),
        Rc::new(DisambiguatePass::new(Tier::Full)),
        Rc::new(ConstantsPass),
        Rc::new(TypeCheckPass),
        Rc::new(ExpectedTypesPass::default()),
        Rc::new(AscribePass),
        Rc::new(SimplifyPass),
    ]
}

/// The standard passes up to and including `until`, minus `skip`.
pub fn select_passes(until: Option<&str>, skip: &[String]) -> Result<Vec<Rc<dyn Pass>>, PipelineError> {
    let known = |name: &str| PASS_ORDER.contains(&name);
    if let Some(name) = until.filter(|n| !known(n)) {
        return Err(PipelineError::UnknownPass(name.to_string()));
    }
    if let Some(name) = skip.iter().find(|n| !known(n)) {
        return Err(PipelineError::UnknownPass(name.clone()));
    }

    let mut passes = Vec::new();
    for pass in standard_passes() {
        let name = pass.name();
        if !skip.iter().any(|s| s == name) {
            passes.push(pass);
        }
        if until == Some(name) {
            break;
        }
    }
    Ok(passes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(passes: &[Rc<dyn Pass>]) -> Vec<&'static str> {
        passes.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn standard_order_matches_names() {
        assert_eq!(names(&standard_passes()), PASS_ORDER.to_vec());
    }

    #[test]
    fn until_and_skip() {
        let passes = select_passes(Some(TYPECHECK), &[CONSTANTS.to_string()]).unwrap();
        assert_eq!(
            names(&passes),
            vec![
                IMPORTS,
                DISAMBIGUATE_OUTER,
                DISAMBIGUATE_SIGNATURES,
                MEMBERS,
                DISAMBIGUATE,
                TYPECHECK
            ]
        );
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            select_passes(Some("codegen"), &[]).err(),
            Some(PipelineError::UnknownPass("codegen".into()))
        );
        assert!(select_passes(None, &["lint".to_string()]).is_err());
    }
}
