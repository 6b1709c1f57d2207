//! Manually clocked output host
//!
//! An [`AudioHost`] with no hardware behind it. The test drives the device
//! by calling [`ManualHost::pull`], which invokes the installed callback
//! synchronously the way a device thread would. Errors can be injected
//! through the stream's error callback.

use justplay::audio::{AudioCallback, AudioHost, OutputStream, StreamSpec};
use justplay::error::DeviceError;
use std::sync::{Arc, Mutex};

type ErrorCallback = Box<dyn FnMut(DeviceError) + Send>;

#[derive(Default)]
struct HostState {
    device_count: usize,
    callback: Option<Box<dyn AudioCallback>>,
    on_error: Option<ErrorCallback>,
    spec: Option<StreamSpec>,
    running: bool,
    /// Id of the stream owning `callback`
    current_stream: u64,
    streams_opened: u64,
    streams_closed: u64,
    open_now: u64,
    peak_open: u64,
    fail_next_start: bool,
    fail_next_open: bool,
    /// Frames of one in-flight period rendered during the next `stop`
    render_on_stop: Option<usize>,
}

/// Host whose single "device" is clocked by the test.
///
/// Clones share state, so a test keeps one handle and gives another to the
/// player.
#[derive(Clone)]
pub struct ManualHost {
    state: Arc<Mutex<HostState>>,
}

impl ManualHost {
    /// Host reporting one output device
    pub fn new() -> Self {
        Self::with_devices(1)
    }

    pub fn with_devices(device_count: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                device_count,
                ..Default::default()
            })),
        }
    }

    /// Run one device period of `frames` frames.
    ///
    /// Returns `None` when no stream is open or the stream is stopped.
    pub fn pull(&self, frames: usize) -> Option<Vec<i16>> {
        let mut state = self.state.lock().unwrap();
        if !state.running {
            return None;
        }
        let channels = state.spec.map(|s| s.channels as usize)?;
        let mut out = vec![0i16; frames * channels];
        state.callback.as_mut()?.render(&mut out);
        Some(out)
    }

    /// Pull periods of `frames` frames `times` times, discarding the output.
    /// Returns how many periods were rendered.
    pub fn pull_n(&self, frames: usize, times: usize) -> usize {
        (0..times).filter(|_| self.pull(frames).is_some()).count()
    }

    /// Deliver an asynchronous stream error, as a device thread would
    pub fn inject_error(&self, error: DeviceError) {
        let mut state = self.state.lock().unwrap();
        if let Some(on_error) = state.on_error.as_mut() {
            on_error(error);
        }
    }

    pub fn fail_next_start(&self) {
        self.state.lock().unwrap().fail_next_start = true;
    }

    /// Make the next `stop` run one last period of `frames` frames before
    /// stopping, like a device callback already in flight
    pub fn render_on_next_stop(&self, frames: usize) {
        self.state.lock().unwrap().render_on_stop = Some(frames);
    }

    pub fn fail_next_open(&self) {
        self.state.lock().unwrap().fail_next_open = true;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Spec of the open stream
    pub fn spec(&self) -> Option<StreamSpec> {
        self.state.lock().unwrap().spec
    }

    pub fn streams_opened(&self) -> u64 {
        self.state.lock().unwrap().streams_opened
    }

    pub fn streams_closed(&self) -> u64 {
        self.state.lock().unwrap().streams_closed
    }

    /// Most streams ever open at the same time
    pub fn peak_open(&self) -> u64 {
        self.state.lock().unwrap().peak_open
    }
}

impl AudioHost for ManualHost {
    type Stream = ManualStream;

    fn output_device_count(&self) -> Result<usize, DeviceError> {
        Ok(self.state.lock().unwrap().device_count)
    }

    fn open_stream<C, E>(
        &self,
        spec: StreamSpec,
        callback: C,
        on_error: E,
    ) -> Result<ManualStream, DeviceError>
    where
        C: AudioCallback,
        E: FnMut(DeviceError) + Send + 'static,
    {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_open {
            state.fail_next_open = false;
            return Err(DeviceError::Open("injected open failure".to_string()));
        }

        state.streams_opened += 1;
        state.open_now += 1;
        state.peak_open = state.peak_open.max(state.open_now);

        let id = state.streams_opened;
        state.current_stream = id;
        state.callback = Some(Box::new(callback));
        state.on_error = Some(Box::new(on_error));
        state.spec = Some(spec);
        state.running = false;

        Ok(ManualStream {
            state: Arc::clone(&self.state),
            id,
        })
    }
}

/// Stream handle returned by [`ManualHost`]
pub struct ManualStream {
    state: Arc<Mutex<HostState>>,
    id: u64,
}

impl OutputStream for ManualStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_start {
            state.fail_next_start = false;
            return Err(DeviceError::Start("injected start failure".to_string()));
        }
        if state.current_stream == self.id {
            state.running = true;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if state.current_stream != self.id {
            return Ok(());
        }
        if let Some(frames) = state.render_on_stop.take() {
            if state.running {
                let channels = state.spec.map(|s| s.channels as usize).unwrap_or(1);
                let mut out = vec![0i16; frames * channels];
                if let Some(callback) = state.callback.as_mut() {
                    callback.render(&mut out);
                }
            }
        }
        state.running = false;
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.streams_closed += 1;
        state.open_now -= 1;
        if state.current_stream == self.id {
            state.running = false;
            state.callback = None;
            state.on_error = None;
            state.spec = None;
        }
    }
}
