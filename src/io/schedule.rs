//! Writing (and, for the round-trip property of §8, reading back) the `Schedule`
//! XML document (§6): per frame, per link, per (instance, replica), the resolved
//! start time in ns, plus the selected path per receiver when path selection is
//! active.
//!
//! The reading idiom mirrors `io::network`'s `roxmltree` traversal; writing uses
//! `quick-xml`'s `Writer`/`BytesStart`/`BytesText` builder API, the crate's own
//! documented usage shape (no concrete writer call site exists anywhere in the
//! retrieved pack to ground against directly — see DESIGN.md).

use std::io::Cursor;
use std::path::Path as FsPath;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Document;

use crate::builder::path_selection::PathSelectors;
use crate::builder::BuilderConfig;
use crate::error::{Result, SchedulerError};
use crate::model::{FrameId, Network};
use crate::solver::SolverBackend;

/// Write the resolved schedule for `network` (after a successful `solve`) to
/// `path`.
pub fn write<B: SolverBackend>(
    network: &Network,
    backend: &B,
    selectors: &PathSelectors,
    config: &BuilderConfig,
    path: &FsPath,
) -> Result<()> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Start(BytesStart::new("Schedule")))
        .map_err(xml_err)?;

    for (fid, frame) in network.frames() {
        let mut frame_elem = BytesStart::new("Frame");
        frame_elem.push_attribute(("id", fid.to_string().as_str()));
        writer.write_event(Event::Start(frame_elem)).map_err(xml_err)?;

        for offset in frame.offsets.iter() {
            let mut link_elem = BytesStart::new("Link");
            link_elem.push_attribute(("id", offset.link.to_string().as_str()));
            writer.write_event(Event::Start(link_elem)).map_err(xml_err)?;

            for i in 0..offset.num_instances as usize {
                let mut instance_elem = BytesStart::new("Instance");
                instance_elem.push_attribute(("id", i.to_string().as_str()));
                writer
                    .write_event(Event::Start(instance_elem))
                    .map_err(xml_err)?;

                for r in 0..offset.num_replicas as usize {
                    let handle = offset.start_time[i][r].ok_or_else(|| {
                        SchedulerError::internal(format!(
                            "frame {fid} link {} instance {i} replica {r} has no variable handle",
                            offset.link
                        ))
                    })?;
                    let value = backend.value_of(handle);

                    let mut replica_elem = BytesStart::new("Replica");
                    replica_elem.push_attribute(("id", r.to_string().as_str()));
                    writer
                        .write_event(Event::Start(replica_elem))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::Start(BytesStart::new("StartTime")))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::Text(BytesText::new(&value.to_string())))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("StartTime")))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("Replica")))
                        .map_err(xml_err)?;
                }

                writer
                    .write_event(Event::End(BytesEnd::new("Instance")))
                    .map_err(xml_err)?;
            }

            writer.write_event(Event::End(BytesEnd::new("Link"))).map_err(xml_err)?;
        }

        if config.path_selection {
            for &receiver_id in &frame.receivers_id {
                if let Some(chosen) = selected_path_index(backend, selectors, fid, receiver_id) {
                    let mut path_elem = BytesStart::new("SelectedPath");
                    path_elem.push_attribute(("receiver", receiver_id.to_string().as_str()));
                    writer.write_event(Event::Start(path_elem)).map_err(xml_err)?;
                    writer
                        .write_event(Event::Text(BytesText::new(&chosen.to_string())))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("SelectedPath")))
                        .map_err(xml_err)?;
                }
            }
        }

        writer.write_event(Event::End(BytesEnd::new("Frame"))).map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("Schedule")))
        .map_err(xml_err)?;

    let bytes = writer.into_inner().into_inner();
    std::fs::write(path, bytes)
        .map_err(|e| SchedulerError::internal(format!("cannot write {path:?}: {e}")))?;
    Ok(())
}

fn selected_path_index<B: SolverBackend>(
    backend: &B,
    selectors: &PathSelectors,
    fid: FrameId,
    receiver_id: u32,
) -> Option<usize> {
    selectors
        .iter()
        .filter(|&(f, k, _, _)| f == fid && k == receiver_id)
        .find(|&(_, _, _, handle)| backend.value_of(handle) == 1)
        .map(|(_, _, p, _)| p)
}

fn xml_err(e: quick_xml::Error) -> SchedulerError {
    SchedulerError::internal(format!("xml write error: {e}"))
}

/// A parsed schedule document, used by the round-trip property of §8: load a
/// network, emit with path selection off, solve, write the schedule, then
/// re-parse it here and re-validate invariants (1)-(4) against the parsed values.
#[derive(Debug, Clone, Default)]
pub struct ScheduleDocument {
    /// `frames[frame_id][link_id] = start_time[instance][replica]`.
    pub frames: std::collections::HashMap<usize, std::collections::HashMap<usize, Vec<Vec<i64>>>>,
}

/// Parse a previously written `Schedule` document back into a
/// [`ScheduleDocument`].
pub fn read(xml: &str) -> Result<ScheduleDocument> {
    let doc = Document::parse(xml)
        .map_err(|e| SchedulerError::invalid_input(format!("malformed schedule XML: {e}")))?;
    let root = doc.root_element();

    let mut out = ScheduleDocument::default();
    for frame_node in root.children().filter(|n| n.has_tag_name("Frame")) {
        let fid = attr_usize(frame_node, "id")?;
        let mut links = std::collections::HashMap::new();
        for link_node in frame_node.children().filter(|n| n.has_tag_name("Link")) {
            let lid = attr_usize(link_node, "id")?;
            let mut instances: Vec<Vec<i64>> = Vec::new();
            for instance_node in link_node.children().filter(|n| n.has_tag_name("Instance")) {
                let mut replicas = Vec::new();
                for replica_node in instance_node.children().filter(|n| n.has_tag_name("Replica")) {
                    let start_node = replica_node
                        .children()
                        .find(|n| n.has_tag_name("StartTime"))
                        .ok_or_else(|| SchedulerError::invalid_input("missing StartTime"))?;
                    let text = start_node.text().unwrap_or("").trim();
                    let value: i64 = text.parse().map_err(|_| {
                        SchedulerError::invalid_input(format!("invalid StartTime: {text}"))
                    })?;
                    replicas.push(value);
                }
                instances.push(replicas);
            }
            links.insert(lid, instances);
        }
        out.frames.insert(fid, links);
    }
    Ok(out)
}

fn attr_usize(node: roxmltree::Node<'_, '_>, name: &str) -> Result<usize> {
    node.attribute(name)
        .ok_or_else(|| SchedulerError::invalid_input(format!("missing @{name}")))?
        .parse()
        .map_err(|_| SchedulerError::invalid_input(format!("invalid @{name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::model::{Frame, Link, LinkType, Network};
    use crate::solver::milp::MilpBackend;
    use crate::solver::SolverBackend;

    /// Round-trip property (§8): load a network, emit with path selection off,
    /// solve, write the schedule, then re-load it and check the start times
    /// still satisfy invariant (1).
    #[test]
    fn written_schedule_round_trips() {
        let mut net = Network::new(0, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link = net.add_link(Link::new(100, LinkType::Wired).unwrap());
        net.add_path(1, 2, crate::model::Path::new(vec![link]).unwrap())
            .unwrap();

        let mut frame = Frame::new(100, 1000, 800, 800, 0, 1, vec![2]).unwrap();
        frame.offset_for_link(link);
        net.add_frame(frame);

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig::default();
        let selectors = build(&mut net, &mut backend, &config).unwrap();
        backend.solve(5).unwrap();

        let path = std::env::temp_dir().join(format!(
            "tt_scheduler_schedule_round_trip_{}.xml",
            std::process::id()
        ));
        write(&net, &backend, &selectors, &config, &path).unwrap();
        let xml = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let doc = read(&xml).unwrap();
        let (fid, _) = net.frames().next().unwrap();
        let start = doc.frames[&fid][&link][0][0];
        assert!((0..=792).contains(&start));
    }
}
