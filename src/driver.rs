//! Interactive menu over a [`RecordStore`].
//!
//! The session never touches a terminal directly: lines come from an
//! [`InputSource`] and everything shown to the user goes to a `Write`. The
//! binary wires these to stdin/stdout, tests wire them to in-memory buffers.
use std::fmt;
use std::io::{self, BufRead, Write};
use std::num::NonZeroUsize;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::codec;
use crate::error::{SessionError, StoreError};
use crate::store::RecordStore;
use crate::student::{validate_name, SortKey, Student, AGE_RANGE, ID_RANGE, SCORE_RANGE};

/// Line-oriented source of user input.
pub trait InputSource {
    /// Next line without its line terminator, or `None` once input is exhausted.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// [`InputSource`] over any buffered reader (stdin, a file, a byte slice).
pub struct LineInput<R> {
    reader: R,
}

impl<R: BufRead> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> InputSource for LineInput<R> {
    /// Invalid UTF-8 is replaced with U+FFFD rather than failing the read.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        let line = match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                warn!("input line was not valid UTF-8, replacing invalid bytes");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(Some(line))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Display,
    SearchById,
    SearchByName,
    Update,
    Delete,
    Sort,
    Save,
    Load,
    Exit,
}

impl Command {
    /// Map a menu number (1-10) to its command.
    pub fn from_choice(choice: u32) -> Option<Self> {
        Some(match choice {
            1 => Command::Add,
            2 => Command::Display,
            3 => Command::SearchById,
            4 => Command::SearchByName,
            5 => Command::Update,
            6 => Command::Delete,
            7 => Command::Sort,
            8 => Command::Save,
            9 => Command::Load,
            10 => Command::Exit,
            _ => return None,
        })
    }
}

enum Flow {
    Continue,
    Exit,
}

/// Render `page` as a table.
pub fn write_page<W: Write>(out: &mut W, page: &[Student]) -> io::Result<()> {
    writeln!(out, "{:<12}{:<24}{:>5}{:>9}", "Roll Number", "Name", "Age", "Marks")?;
    writeln!(out, "{}", "-".repeat(50))?;
    for s in page {
        writeln!(out, "{:<12}{:<24}{:>5}{:>9.2}", s.id, s.name, s.age, s.score)?;
    }
    Ok(())
}

/// One interactive run: owns the store until the user exits.
pub struct Session<I, W> {
    store: RecordStore,
    input: I,
    out: W,
    path: PathBuf,
    page_size: NonZeroUsize,
}

impl<I: InputSource, W: Write> Session<I, W> {
    pub fn new(store: RecordStore, input: I, out: W, path: impl Into<PathBuf>, page_size: NonZeroUsize) -> Self {
        Self { store, input, out, path: path.into(), page_size }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Run the menu until Exit or end of input, then save.
    ///
    /// Returns the final store when the closing save succeeds. A failed save
    /// is shown to the user and returned as [`SessionError::Save`].
    ///
    /// The save is attempted even when the menu loop itself fails (terminal
    /// I/O error, fatal store error); that original error is returned after.
    pub fn run(mut self) -> Result<RecordStore, SessionError> {
        let outcome = self.menu_loop();
        if let Err(e) = &outcome {
            error!(error = %e, "session ended early, saving before exit");
        }
        let saved = self.save_on_exit();
        outcome?;
        saved?;
        Ok(self.store)
    }

    fn menu_loop(&mut self) -> Result<(), SessionError> {
        loop {
            self.menu()?;
            let Some(line) = self.input.read_line()? else {
                writeln!(self.out)?;
                return Ok(());
            };
            let flow = match line.trim().parse().ok().and_then(Command::from_choice) {
                Some(cmd) => self.execute(cmd)?,
                None => {
                    writeln!(self.out, "Invalid choice! Please try again.")?;
                    Flow::Continue
                }
            };
            if let Flow::Exit = flow {
                return Ok(());
            }
        }
    }

    /// Output errors are ignored here: the terminal may be what failed.
    fn save_on_exit(&mut self) -> Result<(), SessionError> {
        let _ = writeln!(self.out, "Saving data and exiting...");
        let result = match codec::save(&self.store, &self.path) {
            Ok(()) => {
                let _ = writeln!(self.out, "Data saved successfully!");
                Ok(())
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "save on exit failed");
                let _ = writeln!(self.out, "Error saving data: {e}");
                Err(SessionError::Save(e))
            }
        };
        let _ = self.out.flush();
        result
    }

    fn menu(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n-------- Student Database Management System --------")?;
        writeln!(self.out, "1. Add a new student")?;
        writeln!(self.out, "2. Display all students (with pagination)")?;
        writeln!(self.out, "3. Search for a student by roll number")?;
        writeln!(self.out, "4. Search for a student by name")?;
        writeln!(self.out, "5. Update a student")?;
        writeln!(self.out, "6. Delete a student")?;
        writeln!(self.out, "7. Sort students (by roll number, name, or marks)")?;
        writeln!(self.out, "8. Save to file")?;
        writeln!(self.out, "9. Load from file")?;
        writeln!(self.out, "10. Exit")?;
        write!(self.out, "Enter your choice: ")?;
        self.out.flush()
    }

    fn execute(&mut self, cmd: Command) -> Result<Flow, SessionError> {
        match cmd {
            Command::Add => self.add(),
            Command::Display => self.display(),
            Command::SearchById => self.search_by_id(),
            Command::SearchByName => self.search_by_name(),
            Command::Update => self.update(),
            Command::Delete => self.delete(),
            Command::Sort => self.sort(),
            Command::Save => {
                match codec::save(&self.store, &self.path) {
                    Ok(()) => writeln!(self.out, "Data saved successfully!")?,
                    Err(e) => writeln!(self.out, "Error saving data: {e}")?,
                }
                Ok(Flow::Continue)
            }
            Command::Load => {
                match codec::load(&self.path) {
                    Ok(store) => {
                        self.store = store;
                        writeln!(self.out, "Data loaded successfully! ({} students)", self.store.len())?;
                    }
                    Err(e) => writeln!(self.out, "Error loading data: {e}")?,
                }
                Ok(Flow::Continue)
            }
            Command::Exit => Ok(Flow::Exit),
        }
    }

    fn add(&mut self) -> Result<Flow, SessionError> {
        let id = loop {
            let Some(id) = self.prompt_in_range("Enter a positive roll number: ", ID_RANGE)? else {
                return Ok(Flow::Exit);
            };
            if !self.store.contains_id(id) {
                break id;
            }
            writeln!(self.out, "Roll number {id} is already taken! Please enter another.")?;
        };
        let Some((name, age, score)) = self.prompt_details("Enter name: ", "Enter age (5-30): ", "Enter marks (0-100): ")? else {
            return Ok(Flow::Exit);
        };
        match self.store.insert(Student::new(id, name, age, score)) {
            Ok(()) => {
                info!(id, "student added");
                writeln!(self.out, "Student added successfully!")?;
            }
            Err(e) => self.report("Could not add student", e)?,
        }
        Ok(Flow::Continue)
    }

    fn display(&mut self) -> Result<Flow, SessionError> {
        let total = self.store.page_count(self.page_size);
        if total == 0 {
            writeln!(self.out, "No students to display.")?;
            return Ok(Flow::Continue);
        }
        for (i, page) in self.store.paginate(self.page_size).enumerate() {
            writeln!(self.out, "\nDisplaying page {}/{}:", i + 1, total)?;
            write_page(&mut self.out, page)?;
            if i + 1 < total {
                writeln!(self.out, "Press Enter to view the next page...")?;
                self.out.flush()?;
                if self.input.read_line()?.is_none() {
                    return Ok(Flow::Exit);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn search_by_id(&mut self) -> Result<Flow, SessionError> {
        let Some(id) = self.prompt_in_range("Enter roll number to search: ", ID_RANGE)? else {
            return Ok(Flow::Exit);
        };
        match self.store.find_by_id(id) {
            Ok(Some(index)) => {
                let s = &self.store.as_slice()[index];
                writeln!(self.out, "Student found: {}, Age: {}, Marks: {:.2}", s.name, s.age, s.score)?;
            }
            Ok(None) => writeln!(self.out, "Student with roll number {id} not found!")?,
            Err(e) => self.report("Search failed", e)?,
        }
        Ok(Flow::Continue)
    }

    fn search_by_name(&mut self) -> Result<Flow, SessionError> {
        let Some(name) = self.prompt_line("Enter the name to search: ")? else {
            return Ok(Flow::Exit);
        };
        match self.store.find_by_name(&name) {
            Some(index) => {
                let s = &self.store.as_slice()[index];
                writeln!(self.out, "Student found: Roll Number: {}, Age: {}, Marks: {:.2}", s.id, s.age, s.score)?;
            }
            None => writeln!(self.out, "Student with name '{name}' not found!")?,
        }
        Ok(Flow::Continue)
    }

    fn update(&mut self) -> Result<Flow, SessionError> {
        let Some(id) = self.prompt_in_range("Enter roll number to update: ", ID_RANGE)? else {
            return Ok(Flow::Exit);
        };
        let index = match self.store.find_by_id(id) {
            Ok(Some(index)) => index,
            Ok(None) => {
                writeln!(self.out, "Student with roll number {id} not found!")?;
                return Ok(Flow::Continue);
            }
            Err(e) => {
                self.report("Update failed", e)?;
                return Ok(Flow::Continue);
            }
        };
        writeln!(self.out, "Updating student: {}", self.store.as_slice()[index].name)?;
        let Some((name, age, score)) = self.prompt_details("Enter new name: ", "Enter new age: ", "Enter new marks: ")? else {
            return Ok(Flow::Exit);
        };
        match self.store.update(id, name, age, score) {
            Ok(_) => writeln!(self.out, "Student updated successfully!")?,
            Err(e) => self.report("Update failed", e)?,
        }
        Ok(Flow::Continue)
    }

    fn delete(&mut self) -> Result<Flow, SessionError> {
        let Some(id) = self.prompt_in_range("Enter roll number to delete: ", ID_RANGE)? else {
            return Ok(Flow::Exit);
        };
        match self.store.delete(id) {
            Ok(true) => {
                info!(id, "student deleted");
                writeln!(self.out, "Student deleted successfully!")?;
            }
            Ok(false) => writeln!(self.out, "Student with roll number {id} not found!")?,
            Err(e) => self.report("Delete failed", e)?,
        }
        Ok(Flow::Continue)
    }

    fn sort(&mut self) -> Result<Flow, SessionError> {
        let Some(choice) = self.prompt_in_range("Sort by: 1. Roll Number, 2. Name, 3. Marks: ", 1..=3)? else {
            return Ok(Flow::Exit);
        };
        let key = match choice {
            1 => SortKey::ById,
            2 => SortKey::ByName,
            _ => SortKey::ByScore,
        };
        self.store.sort(key);
        writeln!(self.out, "Students sorted successfully!")?;
        Ok(Flow::Continue)
    }

    /// Show a non-fatal error to the user; fatal ones end the session.
    fn report(&mut self, what: &str, err: StoreError) -> Result<(), SessionError> {
        if err.is_fatal() {
            error!(error = %err, "fatal store error");
            return Err(SessionError::Fatal(err));
        }
        writeln!(self.out, "{what}: {err}")?;
        Ok(())
    }

    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        self.input.read_line()
    }

    /// Prompt until the answer parses and lies within `range`.
    fn prompt_in_range<T>(&mut self, prompt: &str, range: RangeInclusive<T>) -> io::Result<Option<T>>
    where
        T: FromStr + PartialOrd + fmt::Display,
    {
        loop {
            let Some(line) = self.prompt_line(prompt)? else {
                return Ok(None);
            };
            match line.trim().parse::<T>() {
                Ok(v) if range.contains(&v) => return Ok(Some(v)),
                _ => writeln!(
                    self.out,
                    "Invalid input! Please enter a value between {} and {}.",
                    range.start(),
                    range.end()
                )?,
            }
        }
    }

    /// Prompt until the name fits the store's name limit.
    fn prompt_name(&mut self, prompt: &str) -> io::Result<Option<String>> {
        loop {
            let Some(name) = self.prompt_line(prompt)? else {
                return Ok(None);
            };
            match validate_name(&name) {
                Ok(()) => return Ok(Some(name)),
                Err(e) => writeln!(self.out, "Invalid name: {e}")?,
            }
        }
    }

    fn prompt_details(
        &mut self,
        name_prompt: &str,
        age_prompt: &str,
        score_prompt: &str,
    ) -> io::Result<Option<(String, i32, f32)>> {
        let Some(name) = self.prompt_name(name_prompt)? else {
            return Ok(None);
        };
        let Some(age) = self.prompt_in_range(age_prompt, AGE_RANGE)? else {
            return Ok(None);
        };
        let Some(score) = self.prompt_in_range(score_prompt, SCORE_RANGE)? else {
            return Ok(None);
        };
        Ok(Some((name, age, score)))
    }
}
