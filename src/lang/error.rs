pub struct Error {
    code: u16,
    message: &'static str,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message($msg)
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code: code as u16,
            message: "",
        }
    }

    /// Errors raised by `RTNERR` and restored from state files arrive
    /// as raw numbers.
    pub fn from_code(code: u16) -> Option<Error> {
        if code == 0 || code > ErrorCode::TooFewArguments as u16 {
            None
        } else {
            Some(Error { code, message: "" })
        }
    }

    pub fn message(&self, message: &'static str) -> Error {
        debug_assert_eq!(self.message.len(), 0);
        Error {
            code: self.code,
            message,
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code as u16
    }

    /// Control-flow signals that travel through the error channel but
    /// are never shown to the user.
    pub fn is_pseudo(&self) -> bool {
        use ErrorCode::*;
        [Yes, No, Stop, Run, Interruptible]
            .iter()
            .any(|c| self.code == *c as u16)
    }

    /// Errors that a running SOLVE absorbs as a failed sample.
    pub fn is_solver_trappable(&self) -> bool {
        use ErrorCode::*;
        [OutOfRange, DivideBy0, InvalidData, StatMathError]
            .iter()
            .any(|c| self.code == *c as u16)
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Error {
            code: self.code,
            message: self.message,
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.code == other.code
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => error!(InvalidData; "TRUNCATED STATE FILE"),
            std::io::ErrorKind::OutOfMemory => error!(InsufficientMemory),
            _ => error!(InternalError; "STATE FILE I/O"),
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Error {
        error!(InsufficientMemory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AlphaDataIsInvalid = 1,
    InsufficientMemory = 2,
    NotYetImplemented = 3,
    OutOfRange = 4,
    DivideBy0 = 5,
    InvalidType = 6,
    InvalidData = 7,
    DimensionError = 8,
    SizeError = 9,
    InternalError = 10,
    Nonexistent = 11,
    RestrictedOperation = 12,
    Yes = 13,
    No = 14,
    Stop = 15,
    LabelNotFound = 16,
    NoRealVariables = 17,
    NoComplexVariables = 18,
    NoMatrixVariables = 19,
    NoMenuVariables = 20,
    StatMathError = 21,
    InvalidForecastModel = 22,
    SolveIntegRtnLost = 23,
    SingularMatrix = 24,
    SolveSolve = 25,
    IntegInteg = 26,
    Run = 27,
    Interrupted = 28,
    PrintingIsDisabled = 29,
    Interruptible = 30,
    NoVariables = 31,
    RtnStackFull = 32,
    StackDepthError = 33,
    InvalidContext = 34,
    NameTooLong = 35,
    ProgramLocked = 36,
    NextProgramLocked = 37,
    TooFewArguments = 38,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let code_str = match self.code {
            1 => "Alpha Data Is Invalid",
            2 => "Insufficient Memory",
            3 => "Not Yet Implemented",
            4 => "Out of Range",
            5 => "Divide by 0",
            6 => "Invalid Type",
            7 => "Invalid Data",
            8 => "Dimension Error",
            9 => "Size Error",
            10 => "Internal Error",
            11 => "Nonexistent",
            12 => "Restricted Operation",
            13 => "Yes",
            14 => "No",
            16 => "Label Not Found",
            17 => "No Real Variables",
            18 => "No Complex Variables",
            19 => "No Matrix Variables",
            20 => "No Menu Variables",
            21 => "Stat Math Error",
            22 => "Invalid Forecast Model",
            23 => "Solve/Integ RTN Lost",
            24 => "Singular Matrix",
            25 => "Solve(Solve)",
            26 => "Integ(Integ)",
            28 => "Interrupted",
            29 => "Printing Is Disabled",
            31 => "No Variables",
            32 => "RTN Stack Full",
            33 => "Stack Depth Error",
            34 => "Invalid Context",
            35 => "Name Too Long",
            36 => "Program Locked",
            37 => "Next Program Locked",
            38 => "Too Few Arguments",
            _ => "",
        };
        if code_str.is_empty() {
            write!(f, "Error {}", self.code)
        } else if self.message.is_empty() {
            write!(f, "{}", code_str)
        } else {
            write!(f, "{}; {}", code_str, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_message() {
        assert_eq!(error!(DivideBy0).to_string(), "Divide by 0");
        assert_eq!(
            error!(InvalidData; "TRUNCATED STATE FILE").to_string(),
            "Invalid Data; TRUNCATED STATE FILE"
        );
        assert_eq!(error!(Stop).to_string(), "Error 15");
    }

    #[test]
    fn test_pseudo_errors() {
        assert!(error!(Yes).is_pseudo());
        assert!(error!(Interruptible).is_pseudo());
        assert!(!error!(OutOfRange).is_pseudo());
        assert!(error!(StatMathError).is_solver_trappable());
        assert!(!error!(InvalidType).is_solver_trappable());
    }

    #[test]
    fn test_from_code() {
        assert!(Error::from_code(0).is_none());
        assert!(Error::from_code(5).unwrap().is(ErrorCode::DivideBy0));
        assert!(Error::from_code(999).is_none());
    }
}
