pub mod registry;

pub use registry::Registry;

use crate::{context::Context, packet::Packet, Error};

/// A stage of the memory hierarchy.
///
/// Packets produced by `process` are forwarded to the stage's children.
pub trait Analyzer: std::fmt::Debug {
    fn name(&self) -> &str;

    fn process(
        &mut self,
        packet: &Packet,
        ctx: &mut Context,
        forward: &mut Vec<Packet>,
    ) -> Result<(), Error>;

    fn start_new_frame(&mut self, _frame_id: u64, _ctx: &mut Context) -> Result<(), Error> {
        Ok(())
    }

    fn start_new_scene(
        &mut self,
        _frame_id: u64,
        _scene_id: u64,
        _ctx: &mut Context,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn dump_stats(&mut self, _ctx: &mut Context) -> Result<(), Error> {
        Ok(())
    }

    fn reset_stats(&mut self) {}
}

/// An analyzer and the stages it forwards to.
#[derive(Debug)]
pub struct Node {
    pub analyzer: Box<dyn Analyzer>,
    pub children: Vec<Node>,
}

impl Node {
    #[must_use]
    pub fn new(analyzer: Box<dyn Analyzer>) -> Self {
        Self {
            analyzer,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Runs `packet` through this stage and its children, depth first.
    ///
    /// Job markers reach every stage of the hierarchy.
    pub fn process(&mut self, packet: &Packet, ctx: &mut Context) -> Result<(), Error> {
        let mut forward = Vec::new();
        self.analyzer.process(packet, ctx, &mut forward)?;
        if !packet.kind.is_access() {
            forward.push(packet.clone());
        }
        for fwd in &forward {
            log::trace!("{} => {}", self.analyzer.name(), fwd);
            for child in &mut self.children {
                child.process(fwd, ctx)?;
            }
        }
        Ok(())
    }

    pub fn start_new_frame(&mut self, frame_id: u64, ctx: &mut Context) -> Result<(), Error> {
        self.analyzer.start_new_frame(frame_id, ctx)?;
        for child in &mut self.children {
            child.start_new_frame(frame_id, ctx)?;
        }
        Ok(())
    }

    pub fn start_new_scene(
        &mut self,
        frame_id: u64,
        scene_id: u64,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        self.analyzer.start_new_scene(frame_id, scene_id, ctx)?;
        for child in &mut self.children {
            child.start_new_scene(frame_id, scene_id, ctx)?;
        }
        Ok(())
    }

    pub fn dump_stats(&mut self, ctx: &mut Context) -> Result<(), Error> {
        self.analyzer.dump_stats(ctx)?;
        for child in &mut self.children {
            child.dump_stats(ctx)?;
        }
        Ok(())
    }

    pub fn reset_stats(&mut self) {
        self.analyzer.reset_stats();
        for child in &mut self.children {
            child.reset_stats();
        }
    }

    /// Names of all stages, depth first.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        std::iter::once(self.analyzer.name().to_string())
            .chain(self.children.iter().flat_map(Node::names))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Analyzer, Node};
    use crate::{context::Context, packet, packet::Packet, testing, Error};
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;
    use std::sync::{Arc, Mutex};
    use trace_model::{Access, Device};

    /// Forwards every access twice and logs what it saw.
    #[derive(Debug)]
    struct Duplicate {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Analyzer for Duplicate {
        fn name(&self) -> &str {
            &self.name
        }

        fn process(
            &mut self,
            packet: &Packet,
            _ctx: &mut Context,
            forward: &mut Vec<Packet>,
        ) -> Result<(), Error> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(format!("{}:{:?}", self.name, packet.kind));
            }
            if packet.kind.is_access() {
                forward.push(packet.clone());
                forward.push(packet.clone());
            }
            Ok(())
        }
    }

    #[test]
    fn forwards_depth_first() -> eyre::Result<()> {
        let mut ctx = testing::context(
            crate::trace::Memory::new(),
            crate::classification::Memory::new(),
        )?;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stage = |name: &str| {
            Box::new(Duplicate {
                name: name.to_string(),
                seen: Arc::clone(&seen),
            })
        };
        let mut root = Node::new(stage("l1"))
            .with_child(Node::new(stage("l2")).with_child(Node::new(stage("mem"))));
        diff::assert_eq!(root.names(), vec!["l1", "l2", "mem"]);

        let access = Packet::from_access(&Access::read(0x40, 4, None), 0, Device::GPU);
        root.process(&access, &mut ctx)?;
        let marker = Packet::marker(packet::Kind::END_JOB, 0, 1, Device::GPU);
        root.process(&marker, &mut ctx)?;

        let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        diff::assert_eq!(seen.iter().filter(|s| s.starts_with("l2:READ")).count(), 2);
        diff::assert_eq!(seen.iter().filter(|s| s.starts_with("mem:READ")).count(), 4);
        diff::assert_eq!(seen[..3].join(","), "l1:READ,l2:READ,mem:READ");
        diff::assert_eq!(seen.iter().filter(|s| s.ends_with("END_JOB")).count(), 3);
        Ok(())
    }
}
