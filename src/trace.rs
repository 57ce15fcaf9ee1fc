use super::Error;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use trace_model::{Access, Command, Device, Frame, Job, Resource, Scene};

/// Source of the captured trace.
pub trait TraceStore: std::fmt::Debug {
    fn frame(&self, id: u64) -> Result<Option<Frame>, Error>;

    /// Scene by its index across all frames.
    fn scene(&self, global_id: u64) -> Result<Option<Scene>, Error>;

    fn job(&self, frame_id: u64, job_id: u64) -> Result<Option<Job>, Error>;

    /// Ordered memory accesses of a job.
    ///
    /// Jobs without recorded accesses have no work.
    fn accesses(&self, job: &Job) -> Result<Vec<Access>, Error>;

    fn resource(&self, id: u64) -> Result<Option<Resource>, Error>;

    /// Next entry of the command stream of `device`.
    fn next_command(&mut self, device: Device) -> Result<Option<Command>, Error>;
}

/// Command streams of both devices.
#[derive(Debug, Default, Clone)]
struct Commands {
    cpu: VecDeque<Command>,
    gpu: VecDeque<Command>,
}

impl Commands {
    fn stream(&mut self, device: Device) -> &mut VecDeque<Command> {
        match device {
            Device::CPU => &mut self.cpu,
            Device::GPU => &mut self.gpu,
        }
    }
}

/// In-memory trace.
#[derive(Debug, Default, Clone)]
pub struct Memory {
    frames: HashMap<u64, Frame>,
    scenes: HashMap<u64, Scene>,
    jobs: HashMap<(u64, u64), Job>,
    accesses: HashMap<(u64, u64), Vec<Access>>,
    resources: HashMap<u64, Resource>,
    commands: Commands,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.insert(frame.id, frame);
        self
    }

    #[must_use]
    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scenes.insert(scene.global_id, scene);
        self
    }

    #[must_use]
    pub fn with_job(mut self, job: Job, accesses: Vec<Access>) -> Self {
        let key = (job.frame_id, job.id);
        self.accesses.insert(key, accesses);
        self.jobs.insert(key, job);
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.id, resource);
        self
    }

    #[must_use]
    pub fn with_commands(
        mut self,
        device: Device,
        commands: impl IntoIterator<Item = Command>,
    ) -> Self {
        self.commands.stream(device).extend(commands);
        self
    }
}

impl TraceStore for Memory {
    fn frame(&self, id: u64) -> Result<Option<Frame>, Error> {
        Ok(self.frames.get(&id).cloned())
    }

    fn scene(&self, global_id: u64) -> Result<Option<Scene>, Error> {
        Ok(self.scenes.get(&global_id).cloned())
    }

    fn job(&self, frame_id: u64, job_id: u64) -> Result<Option<Job>, Error> {
        Ok(self.jobs.get(&(frame_id, job_id)).cloned())
    }

    fn accesses(&self, job: &Job) -> Result<Vec<Access>, Error> {
        Ok(self
            .accesses
            .get(&(job.frame_id, job.id))
            .cloned()
            .unwrap_or_default())
    }

    fn resource(&self, id: u64) -> Result<Option<Resource>, Error> {
        Ok(self.resources.get(&id).cloned())
    }

    fn next_command(&mut self, device: Device) -> Result<Option<Command>, Error> {
        Ok(self.commands.stream(device).pop_front())
    }
}

fn read_json<T>(path: &Path) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned,
{
    let reader = utils::fs::open_readable(path)?;
    serde_json::from_reader(reader).map_err(|err| Error::parse(path, err))
}

/// Trace directory.
///
/// Frame, scene, job and resource records and the command streams are loaded
/// eagerly, per job accesses are read on demand from `f{frame}/s{scene}/j{job}.msgpack`.
#[derive(Debug)]
pub struct Dir {
    path: PathBuf,
    index: Memory,
}

impl Dir {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let frames: Vec<Frame> = read_json(&path.join("frames.json"))?;
        let scenes: Vec<Scene> = read_json(&path.join("scenes.json"))?;
        let jobs: Vec<Job> = read_json(&path.join("jobs.json"))?;
        let resources: Vec<Resource> = read_json(&path.join("resources.json"))?;
        let cpu: Vec<Command> = read_json(&path.join("cpu.json"))?;
        let gpu: Vec<Command> = read_json(&path.join("gpu.json"))?;

        log::info!(
            "trace {}: {} frames, {} scenes, {} jobs, {} resources",
            path.display(),
            frames.len(),
            scenes.len(),
            jobs.len(),
            resources.len()
        );

        let mut index = Memory::new()
            .with_commands(Device::CPU, cpu)
            .with_commands(Device::GPU, gpu);
        index.frames.extend(frames.into_iter().map(|f| (f.id, f)));
        index
            .scenes
            .extend(scenes.into_iter().map(|s| (s.global_id, s)));
        index
            .jobs
            .extend(jobs.into_iter().map(|j| ((j.frame_id, j.id), j)));
        index
            .resources
            .extend(resources.into_iter().map(|r| (r.id, r)));
        Ok(Self { path, index })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn job_trace_path(&self, job: &Job) -> PathBuf {
        self.path
            .join(format!("f{}", job.frame_id))
            .join(format!("s{}", job.scene_id))
            .join(format!("j{}.msgpack", job.id))
    }
}

impl TraceStore for Dir {
    fn frame(&self, id: u64) -> Result<Option<Frame>, Error> {
        self.index.frame(id)
    }

    fn scene(&self, global_id: u64) -> Result<Option<Scene>, Error> {
        self.index.scene(global_id)
    }

    fn job(&self, frame_id: u64, job_id: u64) -> Result<Option<Job>, Error> {
        self.index.job(frame_id, job_id)
    }

    fn accesses(&self, job: &Job) -> Result<Vec<Access>, Error> {
        let path = self.job_trace_path(job);
        let reader = match utils::fs::open_readable(&path) {
            Ok(reader) => reader,
            Err(err) if err.is_not_found() => {
                log::trace!("{job} has no access trace");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let accesses: Vec<Access> = rmp_serde::from_read(reader)?;
        Ok(accesses)
    }

    fn resource(&self, id: u64) -> Result<Option<Resource>, Error> {
        self.index.resource(id)
    }

    fn next_command(&mut self, device: Device) -> Result<Option<Command>, Error> {
        self.index.next_command(device)
    }
}
