// crates/aerogate-server/src/assess.rs
// ============================================================================
// Module: Heuristic Risk Assessor
// Description: Deterministic belief-state scoring used without an LLM provider.
// Purpose: Keep packet production deterministic and provider-free by default.
// Dependencies: aerogate-core
// ============================================================================

//! ## Overview
//! When no external assessor is configured, risk is scored by a fixed
//! heuristic over the belief state: instrument weather without dissent holds
//! the gateway, contradicted or thin evidence restricts it, and a complete
//! benign picture accepts freight. The output is a structured record like
//! any external assessor's; the orchestrator treats both identically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aerogate_core::AssessorError;
use aerogate_core::BeliefState;
use aerogate_core::ConfidenceBreakdown;
use aerogate_core::ConfidencePenalty;
use aerogate_core::FlightCategory;
use aerogate_core::Posture;
use aerogate_core::RiskAssessor;
use aerogate_core::RiskAssessment;
use aerogate_core::RiskLevel;
use aerogate_core::SourceSystem;

// ============================================================================
// SECTION: Assessor
// ============================================================================

/// Deterministic heuristic assessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRiskAssessor;

impl RiskAssessor for HeuristicRiskAssessor {
    fn assess(&self, belief: &BeliefState) -> Result<RiskAssessment, AssessorError> {
        let instrument = belief
            .flight_category
            .is_some_and(FlightCategory::is_instrument);
        let lifr = belief.flight_category == Some(FlightCategory::Lifr);
        let signal_count = belief
            .evidence_sources
            .iter()
            .filter(|source| SourceSystem::investigation_set().contains(source))
            .count();
        let (risk_level, recommended_posture) = if lifr && !belief.has_contradictions {
            (RiskLevel::High, Posture::Hold)
        } else if instrument && belief.has_contradictions {
            (RiskLevel::Medium, Posture::Restrict)
        } else if instrument {
            (RiskLevel::Medium, Posture::Restrict)
        } else if belief.has_contradictions || belief.has_stale_evidence || signal_count < 5 {
            (RiskLevel::Medium, Posture::Restrict)
        } else {
            (RiskLevel::Low, Posture::Accept)
        };
        let mut penalties = Vec::new();
        let sources_missing: Vec<SourceSystem> = SourceSystem::investigation_set()
            .into_iter()
            .filter(|source| !belief.evidence_sources.contains(source))
            .collect();
        for source in &sources_missing {
            penalties.push(ConfidencePenalty {
                label: format!("degraded:{}", source.as_str()),
                amount: 0.1,
            });
        }
        if belief.has_contradictions {
            penalties.push(ConfidencePenalty {
                label: "contradictions:open".to_string(),
                amount: 0.15,
            });
        }
        if belief.has_stale_evidence {
            penalties.push(ConfidencePenalty {
                label: "evidence:stale".to_string(),
                amount: 0.1,
            });
        }
        let score = (1.0 - penalties.iter().map(|penalty| penalty.amount).sum::<f64>()).max(0.1);
        Ok(RiskAssessment {
            risk_level,
            recommended_posture,
            confidence: ConfidenceBreakdown {
                sources_ok: belief.evidence_sources.clone(),
                sources_missing,
                penalties,
                score,
                explanation: format!(
                    "{} risk from {} signal sources, contradictions={}, category={}",
                    risk_level.as_str(),
                    signal_count,
                    belief.has_contradictions,
                    belief
                        .flight_category
                        .map_or("unknown", FlightCategory::as_str),
                ),
            },
        })
    }
}
