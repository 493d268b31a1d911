//! Fast deterministic validation of the bundled worked examples.

use crate::axioms::{Axiom, satisfies};
use crate::budget::Budget;
use crate::prefix::{is_prefix_jr, parse_preferences, prefix_jr_rankings};
use crate::profile::{Profile, parse_profile};
use crate::score::pav_score;
use crate::search::find_all_satisfying;

const SCORE_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Public API
// ============================================================================

/// Validates the bundled profiles:
/// - three blocs: `{a,c,e}` satisfies every axiom, `{a,b,c}` none
/// - three pairs: `{a,b,c}` satisfies EJR
/// - PJR vs JR: `{a,b,c,d}` and `{a,d,e,f}` satisfy JR only
/// - two triangles: 18 of the 20 committees satisfy each axiom
/// - six voters: `{a,b,d}` satisfies every axiom
/// - PAV worked example: `{2,3,4}` scores 31/6
/// - five voters: 18 Prefix-JR search rankings, `a1 > a2 > a3 > a4 > a5` is Prefix-JR
///
/// # Errors
/// Returns an error message naming the first example that does not validate.
pub fn validate_known_profiles() -> Result<(), String> {
    let all = [true, true, true];
    let jr_only = [true, false, false];
    let none = [false, false, false];

    let text = include_str!("../data/three_groups.txt");
    validate_committee(text, "three_groups.txt", "a,c,e", all)?;
    validate_committee(text, "three_groups.txt", "a,c,f", all)?;
    validate_committee(text, "three_groups.txt", "a,b,c", none)?;

    let text = include_str!("../data/pairs.txt");
    validate_committee(text, "pairs.txt", "a,b,c", all)?;

    let text = include_str!("../data/pjr_vs_jr.txt");
    validate_committee(text, "pjr_vs_jr.txt", "a,b,c,d", jr_only)?;
    validate_committee(text, "pjr_vs_jr.txt", "a,d,e,f", jr_only)?;

    let text = include_str!("../data/two_triangles.txt");
    validate_counts(text, "two_triangles.txt", 3, [18, 18, 18])?;

    let text = include_str!("../data/six_voters.txt");
    validate_committee(text, "six_voters.txt", "a,b,d", all)?;

    let text = include_str!("../data/pav_worked.txt");
    validate_score(text, "pav_worked.txt", "4,3,2", 31.0 / 6.0)?;

    let text = include_str!("../data/five_voters.txt");
    validate_prefix(text, "five_voters.txt", 18, "a1,a2,a3,a4,a5")?;
    Ok(())
}

/// Checks the JR, PJR and EJR verdicts of one committee (comma-separated ids) on a profile
/// given in the text format.
///
/// # Errors
/// Returns an error message if parsing fails or a verdict differs from `expected`.
pub fn validate_committee(
    text: &str,
    name: &str,
    committee: &str,
    expected: [bool; 3],
) -> Result<(), String> {
    let profile = load(text, name)?;
    let c = profile
        .parse_committee(committee)
        .map_err(|e| format!("{name}: {e}"))?;
    let budget = Budget::unlimited();
    for (axiom, want) in Axiom::all().into_iter().zip(expected) {
        let got = satisfies(&profile, c, axiom, &budget).map_err(|e| format!("{name}: {e}"))?;
        if got != want {
            return Err(format!(
                "{name}: expected {axiom}={want} for {{{committee}}}, got {got}"
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Internal
// ============================================================================

fn load(text: &str, name: &str) -> Result<Profile<String, String>, String> {
    parse_profile(text).map_err(|e| format!("{name}: {e}"))
}

fn validate_counts(text: &str, name: &str, seats: usize, expected: [usize; 3]) -> Result<(), String> {
    let profile = load(text, name)?;
    let budget = Budget::unlimited();
    for (axiom, want) in Axiom::all().into_iter().zip(expected) {
        let found =
            find_all_satisfying(&profile, seats, axiom, &budget).map_err(|e| format!("{name}: {e}"))?;
        if found.len() != want {
            return Err(format!(
                "{name}: expected {want} {axiom} committees of size {seats}, found {}",
                found.len()
            ));
        }
    }
    Ok(())
}

fn validate_score(text: &str, name: &str, committee: &str, expected: f64) -> Result<(), String> {
    let profile = load(text, name)?;
    let c = profile
        .parse_committee(committee)
        .map_err(|e| format!("{name}: {e}"))?;
    let score = pav_score(&profile, c);
    if (score - expected).abs() > SCORE_TOLERANCE {
        return Err(format!(
            "{name}: expected PAV score {expected:.6} for {{{committee}}}, got {score:.6}"
        ));
    }
    Ok(())
}

fn validate_prefix(text: &str, name: &str, expected: usize, ranking: &str) -> Result<(), String> {
    let prefs = parse_preferences(text).map_err(|e| format!("{name}: {e}"))?;
    let found = prefix_jr_rankings(&prefs, &Budget::unlimited()).map_err(|e| format!("{name}: {e}"))?;
    if found.len() != expected {
        return Err(format!(
            "{name}: expected {expected} prefix rankings, found {}",
            found.len()
        ));
    }
    let ranking: Vec<String> = ranking.split(',').map(str::to_string).collect();
    if !is_prefix_jr(&prefs, &ranking).map_err(|e| format!("{name}: {e}"))? {
        return Err(format!("{name}: expected {} to be Prefix-JR", ranking.join(" > ")));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_examples_validate() {
        validate_known_profiles().unwrap();
    }

    #[test]
    fn wrong_expectation_is_reported() {
        let err = validate_committee(
            include_str!("../data/three_groups.txt"),
            "three_groups.txt",
            "a,b,c",
            [true, false, false],
        )
        .unwrap_err();
        assert!(err.contains("expected JR=true"), "{err}");
    }

    #[test]
    fn malformed_input_is_reported() {
        let err = validate_committee("v1 a b\n", "broken.txt", "a", [true; 3]).unwrap_err();
        assert!(err.starts_with("broken.txt: "), "{err}");
    }
}
