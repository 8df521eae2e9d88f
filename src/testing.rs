//! In-memory collaborators for host tests.
//!
//! - `FakeSpace`: paged user address space backed by heap pages
//! - `FakeFs`: growable in-memory files, tracks open counts and flags any
//!   overlapping entry into the storage layer
//! - `FakeConsole`, `FakeMachine`, `YieldScheduler`
//! - `FakeLoader`: runs registered programs on host threads
//! - `UserProcess`: a process plus its address space, with helpers to lay
//!   out a call frame on the user stack and trap

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::drivers::console::Console;
use crate::fs::{File, FileSystem};
use crate::kernel::{Collaborators, Kernel, Loader, Machine, Scheduler, SpawnError};
use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE, PHYS_BASE};
use crate::process::Process;
use crate::syscall::{self, Completion};
use crate::trap::{self, Outcome, TrapFrame, SYSCALL_VECTOR};

/// Start of the read/write data area of a test process.
pub const DATA: usize = 0x0804_8000;
/// Pages in the data area.
pub const DATA_PAGES: usize = 4;
/// A read-only page of a test process.
pub const RODATA: usize = 0x0806_0000;
/// An address nothing is mapped at.
pub const UNMAPPED: usize = 0x1000_0000;

struct Page {
    flags: PageFlags,
    bytes: Box<[u8; PAGE_SIZE]>,
}

/// Paged user address space.
pub struct FakeSpace {
    pages: Mutex<BTreeMap<usize, Page>>,
}

impl FakeSpace {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(BTreeMap::new()),
        }
    }

    /// Map `count` zeroed pages starting at `base`.
    pub fn map(&self, base: usize, count: usize, flags: PageFlags) {
        let mut pages = self.pages.lock().unwrap();
        let first = VirtAddr::new(base).page_number();
        for page in first..first + count {
            pages.insert(
                page,
                Page {
                    flags,
                    bytes: Box::new([0; PAGE_SIZE]),
                },
            );
        }
    }

    /// Test-side write, ignoring page protection.
    pub fn write_bytes(&self, addr: usize, bytes: &[u8]) {
        let mut pages = self.pages.lock().unwrap();
        for (i, &byte) in bytes.iter().enumerate() {
            let va = VirtAddr::new(addr + i);
            let page = pages
                .get_mut(&va.page_number())
                .unwrap_or_else(|| panic!("test wrote to unmapped {}", va));
            page.bytes[va.page_offset()] = byte;
        }
    }

    /// Test-side little-endian word writes.
    pub fn write_words(&self, addr: usize, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.write_bytes(addr + i * 4, &word.to_le_bytes());
        }
    }

    /// Test-side read.
    pub fn read_bytes(&self, addr: usize, len: usize) -> Vec<u8> {
        (0..len).map(|i| self.byte(VirtAddr::new(addr + i))).collect()
    }

    fn byte(&self, va: VirtAddr) -> u8 {
        let pages = self.pages.lock().unwrap();
        match pages.get(&va.page_number()) {
            Some(page) => page.bytes[va.page_offset()],
            None => panic!("kernel read unmapped user address {}", va),
        }
    }
}

impl AddressSpace for FakeSpace {
    fn lookup(&self, va: VirtAddr) -> Option<PageFlags> {
        self.pages
            .lock()
            .unwrap()
            .get(&va.page_number())
            .map(|page| page.flags)
    }

    fn load(&self, va: VirtAddr) -> u8 {
        self.byte(va)
    }

    fn store(&self, va: VirtAddr, byte: u8) {
        let mut pages = self.pages.lock().unwrap();
        match pages.get_mut(&va.page_number()) {
            Some(page) if page.flags.contains(PageFlags::WRITABLE) => {
                page.bytes[va.page_offset()] = byte;
            }
            _ => panic!("kernel wrote to unwritable user address {}", va),
        }
    }
}

#[derive(Default)]
struct FsState {
    files: BTreeMap<String, Arc<Mutex<Vec<u8>>>>,
    open: BTreeMap<String, usize>,
}

/// In-memory storage layer.
#[derive(Clone, Default)]
pub struct FakeFs {
    state: Arc<Mutex<FsState>>,
    inside: Arc<AtomicBool>,
    overlap: Arc<AtomicBool>,
}

/// Marks one entry into the storage layer.
struct Entry<'a> {
    fs: &'a FakeFs,
}

impl<'a> Entry<'a> {
    fn new(fs: &'a FakeFs) -> Self {
        if fs.inside.swap(true, Ordering::SeqCst) {
            fs.overlap.store(true, Ordering::SeqCst);
        }
        // Widen the window an unserialized caller would hit.
        thread::yield_now();
        Self { fs }
    }
}

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        self.fs.inside.store(false, Ordering::SeqCst);
    }
}

impl FakeFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file with contents, bypassing the gate.
    pub fn add_file(&self, name: &str, contents: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(name.to_string(), Arc::new(Mutex::new(contents.to_vec())));
    }

    /// Open handles on `name`.
    pub fn open_count(&self, name: &str) -> usize {
        self.state.lock().unwrap().open.get(name).copied().unwrap_or(0)
    }

    /// Open handles on all files.
    pub fn total_open(&self) -> usize {
        self.state.lock().unwrap().open.values().sum()
    }

    /// Whether two callers were ever inside the storage layer at once.
    pub fn saw_concurrent_entry(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }
}

impl FileSystem for FakeFs {
    fn create(&self, name: &str, initial_size: u32) -> bool {
        let _entry = Entry::new(self);
        let mut state = self.state.lock().unwrap();
        if name.is_empty() || state.files.contains_key(name) {
            return false;
        }
        state.files.insert(
            name.to_string(),
            Arc::new(Mutex::new(vec![0; initial_size as usize])),
        );
        true
    }

    fn remove(&self, name: &str) -> bool {
        let _entry = Entry::new(self);
        self.state.lock().unwrap().files.remove(name).is_some()
    }

    fn open(&self, name: &str) -> Option<Box<dyn File>> {
        let _entry = Entry::new(self);
        let mut state = self.state.lock().unwrap();
        let data = state.files.get(name)?.clone();
        *state.open.entry(name.to_string()).or_insert(0) += 1;
        Some(Box::new(FakeFile {
            fs: self.clone(),
            name: name.to_string(),
            data,
            pos: 0,
        }))
    }
}

struct FakeFile {
    fs: FakeFs,
    name: String,
    data: Arc<Mutex<Vec<u8>>>,
    pos: usize,
}

impl File for FakeFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let _entry = Entry::new(&self.fs);
        let data = self.data.lock().unwrap();
        let start = self.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n;
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let _entry = Entry::new(&self.fs);
        let mut data = self.data.lock().unwrap();
        let end = self.pos + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        buf.len()
    }

    fn seek(&mut self, pos: u32) {
        let _entry = Entry::new(&self.fs);
        self.pos = pos as usize;
    }

    fn tell(&self) -> u32 {
        let _entry = Entry::new(&self.fs);
        self.pos as u32
    }

    fn length(&self) -> u32 {
        let _entry = Entry::new(&self.fs);
        self.data.lock().unwrap().len() as u32
    }
}

impl Drop for FakeFile {
    fn drop(&mut self) {
        let _entry = Entry::new(&self.fs);
        let mut state = self.fs.state.lock().unwrap();
        if let Some(count) = state.open.get_mut(&self.name) {
            *count -= 1;
            if *count == 0 {
                state.open.remove(&self.name);
            }
        }
    }
}

struct ConsoleState {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

/// Console with scripted input and captured output.
#[derive(Clone)]
pub struct FakeConsole {
    state: Arc<ConsoleState>,
}

impl FakeConsole {
    pub fn new(input: &[u8]) -> Self {
        Self {
            state: Arc::new(ConsoleState {
                input: Mutex::new(input.iter().copied().collect()),
                output: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.state.output.lock().unwrap()).into_owned()
    }
}

impl Console for FakeConsole {
    fn getc(&self) -> u8 {
        self.state.input.lock().unwrap().pop_front().unwrap_or(0)
    }

    fn putbuf(&self, buf: &[u8]) {
        self.state.output.lock().unwrap().extend_from_slice(buf);
    }
}

/// Records power-off requests.
#[derive(Clone, Default)]
pub struct FakeMachine {
    off: Arc<AtomicBool>,
}

impl FakeMachine {
    pub fn is_off(&self) -> bool {
        self.off.load(Ordering::SeqCst)
    }
}

impl Machine for FakeMachine {
    fn power_off(&self) {
        self.off.store(true, Ordering::SeqCst);
    }
}

/// Scheduler that yields the host thread.
pub struct YieldScheduler;

impl Scheduler for YieldScheduler {
    fn yield_now(&self) {
        thread::yield_now();
    }
}

type Program = Arc<dyn Fn(&Arc<Kernel>, &UserProcess) -> i32 + Send + Sync>;

#[derive(Default)]
struct LoaderState {
    programs: Mutex<BTreeMap<String, Program>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    refuse: AtomicBool,
}

/// Loader running registered programs on host threads.
///
/// Unregistered names fail to load. A program's return value becomes its
/// exit status unless it already exited through a system call.
#[derive(Clone, Default)]
pub struct FakeLoader {
    state: Arc<LoaderState>,
}

impl FakeLoader {
    pub fn register<F>(&self, name: &str, program: F)
    where
        F: Fn(&Arc<Kernel>, &UserProcess) -> i32 + Send + Sync + 'static,
    {
        self.state
            .programs
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(program));
    }

    /// Make every later spawn fail before a context is created.
    pub fn refuse_spawns(&self) {
        self.state.refuse.store(true, Ordering::SeqCst);
    }

    /// Join every program thread started so far, including nested ones.
    pub fn join_all(&self) {
        loop {
            let handles = std::mem::take(&mut *self.state.threads.lock().unwrap());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                handle.join().unwrap();
            }
        }
    }
}

impl Loader for FakeLoader {
    fn spawn(
        &self,
        kernel: &Arc<Kernel>,
        child: Arc<Process>,
        _cmdline: &str,
    ) -> Result<(), SpawnError> {
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(SpawnError::NoThread);
        }
        let program = self.state.programs.lock().unwrap().get(child.name()).cloned();
        let kernel = kernel.clone();
        let handle = thread::spawn(move || match program {
            Some(program) => {
                kernel.report_load(&child, true);
                let user = UserProcess::new(child);
                let status = program(&kernel, &user);
                kernel.terminate(&user.process, status);
            }
            None => kernel.report_load(&child, false),
        });
        self.state.threads.lock().unwrap().push(handle);
        Ok(())
    }
}

/// A kernel wired to fakes, with handles on the fakes.
pub struct Harness {
    pub kernel: Arc<Kernel>,
    pub fs: FakeFs,
    pub console: FakeConsole,
    pub machine: FakeMachine,
    pub loader: FakeLoader,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(input: &[u8]) -> Self {
        let fs = FakeFs::new();
        let console = FakeConsole::new(input);
        let machine = FakeMachine::default();
        let loader = FakeLoader::default();
        let kernel = Kernel::new(Collaborators {
            fs: Box::new(fs.clone()),
            console: Box::new(console.clone()),
            loader: Box::new(loader.clone()),
            machine: Box::new(machine.clone()),
            scheduler: Box::new(YieldScheduler),
        });
        Self {
            kernel,
            fs,
            console,
            machine,
            loader,
        }
    }
}

/// A process and its address space: one stack page below `PHYS_BASE`, a
/// read/write data area and a read-only page.
pub struct UserProcess {
    pub process: Arc<Process>,
    pub space: FakeSpace,
    cursor: AtomicUsize,
}

impl UserProcess {
    /// Value the return register holds before a trap.
    pub const EAX_POISON: u32 = 0xDEAD_BEEF;

    pub fn new(process: Arc<Process>) -> Self {
        let space = FakeSpace::new();
        space.map(PHYS_BASE - PAGE_SIZE, 1, PageFlags::USER_RW);
        space.map(DATA, DATA_PAGES, PageFlags::USER_RW);
        space.map(RODATA, 1, PageFlags::USER_RO);
        space.write_bytes(RODATA, b"read-only\0");
        Self {
            process,
            space,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Stack pointer at trap time.
    pub fn esp(&self) -> u32 {
        (PHYS_BASE - 64) as u32
    }

    /// Place a NUL-terminated string in the data area.
    pub fn str_arg(&self, s: &str) -> u32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.bytes_arg(&bytes)
    }

    /// Place raw bytes in the data area.
    pub fn bytes_arg(&self, bytes: &[u8]) -> u32 {
        let offset = self.cursor.fetch_add(bytes.len().max(1), Ordering::SeqCst);
        assert!(offset + bytes.len() <= DATA_PAGES * PAGE_SIZE, "data area full");
        self.space.write_bytes(DATA + offset, bytes);
        (DATA + offset) as u32
    }

    pub fn read_back(&self, addr: u32, len: usize) -> Vec<u8> {
        self.space.read_bytes(addr as usize, len)
    }

    fn push_frame(&self, nr: u32, args: &[u32]) {
        let mut words = vec![nr];
        words.extend_from_slice(args);
        self.space.write_words(self.esp() as usize, &words);
    }

    /// Issue a system call straight into the dispatcher.
    pub fn call(&self, kernel: &Arc<Kernel>, nr: u32, args: &[u32]) -> Completion {
        self.push_frame(nr, args);
        syscall::dispatch(kernel, &self.process, &self.space, VirtAddr::from(self.esp()))
    }

    /// Issue a system call through the trap entry.
    pub fn trap(&self, kernel: &Arc<Kernel>, nr: u32, args: &[u32]) -> (Outcome, TrapFrame) {
        self.push_frame(nr, args);
        let mut frame = TrapFrame {
            eax: Self::EAX_POISON,
            vec_no: SYSCALL_VECTOR,
            cr2: 0,
            eip: DATA as u32,
            esp: self.esp(),
        };
        let outcome = trap::handle_trap(kernel, &self.process, &self.space, &mut frame);
        (outcome, frame)
    }
}
