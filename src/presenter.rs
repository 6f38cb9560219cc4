use std::io::{self, Write};

use crate::todo::{Task, TaskList, TaskStatus};

/// Console rendering of task lists and their tasks.
pub struct Presenter<W> {
    out: W,
}

impl<W: Write> Presenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn no_lists(&mut self) -> io::Result<()> {
        writeln!(self.out, "No task lists found.")
    }

    pub fn heading(&mut self) -> io::Result<()> {
        writeln!(self.out, "--- Your task lists ---")
    }

    pub fn list_header(&mut self, list: &TaskList) -> io::Result<()> {
        writeln!(self.out, "- {} ({})", list.title, list.id)?;
        writeln!(self.out, "  --- Tasks in '{}' ---", list.title)
    }

    pub fn tasks(&mut self, tasks: &[Task]) -> io::Result<()> {
        if tasks.is_empty() {
            writeln!(self.out, "    No tasks in this list.")?;
        }
        for task in tasks {
            writeln!(self.out, "    - [{}] {}", status_symbol(task.status), task.title)?;
        }
        writeln!(self.out)
    }
}

pub fn status_symbol(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "X",
        TaskStatus::NeedsAction | TaskStatus::Unknown => " ",
    }
}
