//! Stage 8 of §4.3.8, split in two: link distances are allocated before
//! contention freedom (stage 7), since `D_ℓ` is used as additive slack inside the
//! non-overlap disjunction there; frame distances and the final objective are
//! assembled afterward. §4.3.8's own stated principle — "every referenced variable
//! is declared before any constraint references it" — requires this split; the
//! flat numbering in §4.3.8 lists both halves of stage 8 after stage 7 only
//! because it does not separately call out the slack dependency. See DESIGN.md.

use std::collections::HashMap;

use crate::builder::path_selection::PathSelectors;
use crate::builder::BuilderConfig;
use crate::error::{Result, SchedulerError};
use crate::model::offset::VarHandle;
use crate::model::{LinkId, Network};
use crate::solver::{Cmp, Direction, LinConstraint, LinExpr, SolverBackend};

/// `D_ℓ` handles, one per link carrying at least one frame's offset.
#[derive(Debug, Default, Clone)]
pub struct LinkDistances {
    vars: HashMap<LinkId, VarHandle>,
}

impl LinkDistances {
    /// The distance variable for `link`, if one was allocated.
    pub fn get(&self, link: LinkId) -> Option<VarHandle> {
        self.vars.get(&link).copied()
    }

    /// Every `(link, handle)` pair, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (LinkId, VarHandle)> + '_ {
        self.vars.iter().map(|(&l, &h)| (l, h))
    }
}

/// Allocate `D_ℓ ∈ [0, hyperperiod]` for every link carrying at least one offset,
/// named `D_link_<link>`. When optimization is disabled, pins each to `0` via an
/// equality rather than skipping allocation, so later stages can always assume a
/// handle exists (§4.3.7: "all D = 0 ... asserted via equalities").
pub fn allocate_link_distances<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
    config: &BuilderConfig,
) -> Result<LinkDistances> {
    let mut distances = LinkDistances::default();
    let hyperperiod = network.hyperperiod() as i64;

    let mut links: Vec<LinkId> = Vec::new();
    for (_, frame) in network.frames() {
        for offset in frame.offsets.iter() {
            if !links.contains(&offset.link) {
                links.push(offset.link);
            }
        }
    }

    for link in links {
        let var = backend.new_integer(&format!("D_link_{link}"), 0, hyperperiod);
        if !config.optimization {
            backend.assert_linear(LinConstraint {
                expr: LinExpr::var(var),
                cmp: Cmp::Eq,
            });
        }
        distances.vars.insert(link, var);
    }

    Ok(distances)
}

/// Stage 8 (second half): allocate `D_f ∈ [0, end_to_end(f)]` per frame, assert
/// `O_first ≥ starting(f) + D_f` and `O_last ≤ deadline(f) − D_f` along every
/// selected path, and set the final objective `w_frame·Σ D_f + w_link·Σ D_ℓ`
/// (maximized). When optimization is disabled, every `D_f` is pinned to `0` and no
/// objective is set (§4.3.7).
pub fn allocate_frame_distances_and_objective<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
    selectors: &PathSelectors,
    link_distances: &LinkDistances,
    config: &BuilderConfig,
) -> Result<()> {
    let mut objective_terms: Vec<(f64, VarHandle)> = Vec::new();

    for (fid, frame) in network.frames() {
        let d_f = backend.new_integer(&format!("D_frame_{fid}"), 0, frame.end_to_end as i64);
        if !config.optimization {
            backend.assert_linear(LinConstraint {
                expr: LinExpr::var(d_f),
                cmp: Cmp::Eq,
            });
        } else {
            objective_terms.push((config.frame_distance_weight, d_f));
        }

        let sender_idx = network.end_system_idx(frame.sender_id).ok_or_else(|| {
            SchedulerError::structural(format!(
                "frame {fid} references unknown sender end system {}",
                frame.sender_id
            ))
        })?;
        for &receiver_id in &frame.receivers_id {
            let receiver_idx = network.end_system_idx(receiver_id).ok_or_else(|| {
                SchedulerError::structural(format!(
                    "frame {fid} references unknown receiver end system {receiver_id}"
                ))
            })?;
            let paths = network.paths().paths_for(sender_idx, receiver_idx);
            let active_paths: Vec<usize> = if config.path_selection {
                (0..paths.len()).collect()
            } else {
                vec![0]
            };

            for &p in &active_paths {
                let path = &paths[p];
                let first_offset = frame.offset_for(path.first_link()).ok_or_else(|| {
                    SchedulerError::internal(format!(
                        "frame {fid} has no offset on its own path's first link"
                    ))
                })?;
                let last_offset = frame.offset_for(path.last_link()).ok_or_else(|| {
                    SchedulerError::internal(format!(
                        "frame {fid} has no offset on its own path's last link"
                    ))
                })?;
                let first_var =
                    first_offset.start_time[0][0].expect("stage 1 allocated every variable");
                let last_var =
                    last_offset.start_time[0][0].expect("stage 1 allocated every variable");

                let lower = LinConstraint {
                    expr: LinExpr::var(first_var)
                        .with_term(-1, d_f)
                        .with_constant(-(frame.starting as i64)),
                    cmp: Cmp::Ge,
                };
                let upper = LinConstraint {
                    expr: LinExpr::var(last_var)
                        .with_term(1, d_f)
                        .with_constant(-(frame.deadline as i64)),
                    cmp: Cmp::Le,
                };

                if config.path_selection {
                    let selector = selectors.get(fid, receiver_id, p).ok_or_else(|| {
                        SchedulerError::internal(format!(
                            "missing path selector for frame {fid} receiver {receiver_id} path {p}"
                        ))
                    })?;
                    backend.assert_indicator(selector, true, lower);
                    backend.assert_indicator(selector, true, upper);
                } else {
                    backend.assert_linear(lower);
                    backend.assert_linear(upper);
                }
            }
        }
    }

    if config.optimization {
        for (link, d_link) in link_distances.iter() {
            let _ = link;
            objective_terms.push((config.link_distance_weight, d_link));
        }
        backend.set_objective(&objective_terms, Direction::Maximize);
    }

    Ok(())
}
