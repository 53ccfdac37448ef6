use std::ffi::{OsStr, OsString};

/// Program plus a flat, ordered argument vector.
///
/// Arguments can be pushed one at a time or as any iterable; both end up in
/// the same list, so `args(["-m", msg]).arg("--quiet")` and a single
/// `args` call with all three are equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    program: OsString,
    argv: Vec<OsString>,
}

impl CommandBuilder {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            argv: Vec::new(),
        }
    }

    /// Build from an already split command line, `None` if it is empty.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut argv = argv.into_iter();
        let mut builder = Self::new(argv.next()?);
        builder.args(argv);
        Some(builder)
    }

    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.argv.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> {
        self.argv.iter().map(OsString::as_os_str)
    }

    /// Returns the command line as a string for logs and diagnostics
    pub fn as_command_line(&self) -> String {
        let mut parts: Vec<String> = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(
            self.argv
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        shell_words::join(parts)
    }
}
