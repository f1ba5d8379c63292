use std::fmt;

/// Sentinel line numbers used by the runtime for frames without a line.
pub const NO_LINE_NUMBER: i32 = 0;
pub const UNKNOWN_LOCATION: i32 = -1;
pub const COMPILED_METHOD: i32 = -2;
pub const NATIVE_METHOD: i32 = -3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub method_name: String,
    pub signature: String,
    pub source_file: String,
    pub line_number: i32,
}

impl StackFrame {
    pub fn new(
        method_name: impl Into<String>,
        signature: impl Into<String>,
        source_file: impl Into<String>,
        line_number: i32,
    ) -> Self {
        StackFrame {
            method_name: method_name.into(),
            signature: signature.into(),
            source_file: source_file.into(),
            line_number,
        }
    }

    fn line_number_string(&self) -> String {
        match self.line_number {
            NO_LINE_NUMBER => "No line number".to_string(),
            UNKNOWN_LOCATION => "Unknown line number".to_string(),
            COMPILED_METHOD => "Compiled method".to_string(),
            NATIVE_METHOD => "Native method".to_string(),
            n => n.to_string(),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} - {}:{}",
            self.method_name,
            self.signature,
            self.source_file,
            self.line_number_string()
        )
    }
}

/// Call stack captured when an instance was allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTrace {
    pub serial: u32,
    pub thread_serial: u32,
    pub frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn new(serial: u32, thread_serial: u32, frames: Vec<StackFrame>) -> Self {
        StackTrace {
            serial,
            thread_serial,
            frames,
        }
    }

    /// Top-most frame, i.e. where the allocation happened.
    pub fn allocation_site(&self) -> Option<&StackFrame> {
        self.frames.first()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "StackTrace {} (thread {}):",
            self.serial, self.thread_serial
        )?;
        for frame in &self.frames {
            writeln!(f, "  {}", frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_display() {
        let frame = StackFrame::new("run", "()V", "Main.java", 12);
        assert_eq!(frame.to_string(), "run()V - Main.java:12");
        let native = StackFrame::new("arraycopy", "()V", "System.java", NATIVE_METHOD);
        assert_eq!(native.to_string(), "arraycopy()V - System.java:Native method");
    }

    #[test]
    fn test_allocation_site() {
        let trace = StackTrace::new(
            1,
            7,
            vec![
                StackFrame::new("alloc", "()V", "A.java", 3),
                StackFrame::new("main", "()V", "A.java", 9),
            ],
        );
        assert_eq!(trace.allocation_site().unwrap().method_name, "alloc");
        assert!(StackTrace::new(2, 7, vec![]).allocation_site().is_none());
    }
}
