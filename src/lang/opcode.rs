/// ## Instruction set
///
/// Every command the engine knows, in opcode order. The opcode number is
/// the position in this table and is what the bytecode stores, so new
/// commands are only ever appended.

/// What kind of argument a command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    None,
    /// Variable name, register number, stack register or indirect.
    Var,
    /// Like `Var` but the variable must hold a real.
    Real,
    /// Variable name only.
    Named,
    /// Matrix variable name.
    Mat,
    /// Real variable name.
    RVar,
    /// Local label, numeric label or global label.
    Label,
    /// Global label only.
    Program,
    Num9,
    Num11,
    Num99,
    Count,
    Other,
    MenuKey,
    CustomKey,
    /// Long string literal.
    XStr,
}

/// Not shown in catalogs and not parsed from text.
pub const HIDDEN: u8 = 1;
/// Cannot be entered into a program.
pub const NO_PRGM: u8 = 2;
/// Only meaningful inside a program.
pub const PRGM_ONLY: u8 = 4;
/// Executes immediately even in program mode.
pub const IMMED: u8 = 8;
pub const NO_SHOW: u8 = 16;

struct Spec {
    name: &'static str,
    arg: ArgKind,
    flags: u8,
}

macro_rules! commands {
    ($($variant:ident = $name:expr, $arg:ident, $flags:expr;)*) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        const SPECS: &[Spec] = &[
            $(Spec { name: $name, arg: ArgKind::$arg, flags: $flags },)*
        ];

        const ALL: &[Opcode] = &[
            $(Opcode::$variant,)*
        ];
    };
}

commands! {
    ClX = "CLX", None, 0;
    Enter = "ENTER", None, 0;
    Swap = "X<>Y", None, 0;
    RDn = "R↓", None, 0;
    Chs = "+/-", None, 0;
    Div = "÷", None, 0;
    Mul = "×", None, 0;
    Sub = "-", None, 0;
    Add = "+", None, 0;
    LastX = "LASTX", None, 0;
    SilentOff = "", None, HIDDEN | NO_SHOW;
    SilentOn = "", None, HIDDEN | NO_SHOW;
    Sin = "SIN", None, 0;
    Cos = "COS", None, 0;
    Tan = "TAN", None, 0;
    Asin = "ASIN", None, 0;
    Acos = "ACOS", None, 0;
    Atan = "ATAN", None, 0;
    Log = "LOG", None, 0;
    TenPowX = "10^X", None, 0;
    Ln = "LN", None, 0;
    EPowX = "E^X", None, 0;
    Sqrt = "SQRT", None, 0;
    Square = "X^2", None, 0;
    Inv = "1/X", None, 0;
    YPowX = "Y^X", None, 0;
    Percent = "%", None, 0;
    Pi = "PI", None, 0;
    Complex = "COMPLEX", None, 0;
    Sto = "STO", Var, 0;
    StoDiv = "STO÷", Var, 0;
    StoMul = "STO×", Var, 0;
    StoSub = "STO-", Var, 0;
    StoAdd = "STO+", Var, 0;
    Rcl = "RCL", Var, 0;
    RclDiv = "RCL÷", Var, 0;
    RclMul = "RCL×", Var, 0;
    RclSub = "RCL-", Var, 0;
    RclAdd = "RCL+", Var, 0;
    Fix = "FIX", Num11, 0;
    Sci = "SCI", Num11, 0;
    Eng = "ENG", Num11, 0;
    All = "ALL", None, 0;
    Null = "NULL", None, HIDDEN;
    Asto = "ASTO", Var, 0;
    Arcl = "ARCL", Var, 0;
    ClA = "CLA", None, 0;
    Deg = "DEG", None, 0;
    Rad = "RAD", None, 0;
    Grad = "GRAD", None, 0;
    Rect = "RECT", None, 0;
    Polar = "POLAR", None, 0;
    Size = "SIZE", Count, 0;
    Quiet = "QUIET", None, IMMED;
    Cpxres = "CPXRES", None, 0;
    Realres = "REALRES", None, 0;
    Keyasn = "KEYASN", None, 0;
    Lclbl = "LCLBL", None, 0;
    Rdxdot = "RDX.", None, 0;
    Rdxcomma = "RDX,", None, 0;
    ClSigma = "CLΣ", None, 0;
    ClP = "CLP", Program, 0;
    ClV = "CLV", Named, 0;
    ClSt = "CLST", None, 0;
    ClRg = "CLRG", None, 0;
    Del = "DEL", Count, PRGM_ONLY | IMMED;
    ClKeys = "CLKEYS", None, 0;
    ClLcd = "CLLCD", None, 0;
    ClMenu = "CLMENU", None, 0;
    ClAllA = "CLALL", None, IMMED;
    ToDeg = "→DEG", None, 0;
    ToRad = "→RAD", None, 0;
    ToHr = "→HR", None, 0;
    ToHms = "→HMS", None, 0;
    ToRec = "→REC", None, 0;
    ToPol = "→POL", None, 0;
    Ip = "IP", None, 0;
    Fp = "FP", None, 0;
    Rnd = "RND", None, 0;
    Abs = "ABS", None, 0;
    Sign = "SIGN", None, 0;
    Mod = "MOD", None, 0;
    Sf = "SF", Num99, 0;
    Cf = "CF", Num99, 0;
    FsT = "FS?", Num99, 0;
    FcT = "FC?", Num99, 0;
    FscT = "FS?C", Num99, 0;
    FccT = "FC?C", Num99, 0;
    Comb = "COMB", None, 0;
    Perm = "PERM", None, 0;
    Fact = "N!", None, 0;
    Gamma = "GAMMA", None, 0;
    Ran = "RAN", None, 0;
    Seed = "SEED", None, 0;
    Lbl = "LBL", Other, PRGM_ONLY;
    Rtn = "RTN", None, 0;
    Input = "INPUT", Var, PRGM_ONLY;
    View = "VIEW", Var, 0;
    Aview = "AVIEW", None, 0;
    Xeq = "XEQ", Label, 0;
    Prompt = "PROMPT", None, 0;
    Pse = "PSE", None, 0;
    Isg = "ISG", Real, 0;
    Dse = "DSE", Real, 0;
    Aip = "AIP", None, 0;
    Xtoa = "XTOA", None, 0;
    Agraph = "AGRAPH", None, 0;
    Pixel = "PIXEL", None, 0;
    Beep = "BEEP", None, 0;
    Tone = "TONE", Num9, 0;
    Mvar = "MVAR", RVar, 0;
    VarMenu = "VARMENU", Program, 0;
    GetKey = "GETKEY", None, 0;
    Menu = "MENU", None, PRGM_ONLY;
    Keyg = "KEYG", MenuKey, 0;
    Keyx = "KEYX", MenuKey, 0;
    XEq0 = "X=0?", None, 0;
    XNe0 = "X≠0?", None, 0;
    XLt0 = "X<0?", None, 0;
    XGt0 = "X>0?", None, 0;
    XLe0 = "X≤0?", None, 0;
    XGe0 = "X≥0?", None, 0;
    XEqY = "X=Y?", None, 0;
    XNeY = "X≠Y?", None, 0;
    XLtY = "X<Y?", None, 0;
    XGtY = "X>Y?", None, 0;
    XLeY = "X≤Y?", None, 0;
    XGeY = "X≥Y?", None, 0;
    PrSigma = "PRΣ", None, 0;
    Prp = "PRP", Program, IMMED;
    Prv = "PRV", Named, 0;
    PrStk = "PRSTK", None, 0;
    Pra = "PRA", None, 0;
    Prx = "PRX", None, 0;
    PrUsr = "PRUSR", None, 0;
    List = "LIST", Count, IMMED;
    Adv = "ADV", None, 0;
    Prlcd = "PRLCD", None, 0;
    Delay = "DELAY", None, 0;
    Pon = "PRON", None, 0;
    Poff = "PROFF", None, 0;
    Man = "MAN", None, 0;
    Norm = "NORM", None, 0;
    Trace = "TRACE", None, 0;
    SigmaAdd = "Σ+", None, 0;
    SigmaSub = "Σ-", None, 0;
    Gto = "GTO", Label, 0;
    End = "END", None, 0;
    Number = "", None, HIDDEN;
    Str = "", None, HIDDEN;
    Run = "RUN", None, HIDDEN;
    Sst = "SST", None, 0;
    GtoDot = "GTO .", Other, IMMED;
    GtoDotDot = "GTO ..", None, IMMED;
    Stop = "STOP", None, 0;
    NewMat = "NEWMAT", None, 0;
    RUp = "R^", None, 0;
    RealT = "REAL?", None, 0;
    CpxT = "CPX?", None, 0;
    StrT = "STR?", None, 0;
    MatT = "MAT?", None, 0;
    DimT = "DIM?", None, 0;
    AssignA = "ASSIGN", Named, 0;
    AssignB = "", CustomKey, HIDDEN;
    Asgn01 = "", Other, HIDDEN;
    Asgn02 = "", Other, HIDDEN;
    Asgn03 = "", Other, HIDDEN;
    Asgn04 = "", Other, HIDDEN;
    Asgn05 = "", Other, HIDDEN;
    Asgn06 = "", Other, HIDDEN;
    Asgn07 = "", Other, HIDDEN;
    Asgn08 = "", Other, HIDDEN;
    Asgn09 = "", Other, HIDDEN;
    Asgn10 = "", Other, HIDDEN;
    Asgn11 = "", Other, HIDDEN;
    Asgn12 = "", Other, HIDDEN;
    Asgn13 = "", Other, HIDDEN;
    Asgn14 = "", Other, HIDDEN;
    Asgn15 = "", Other, HIDDEN;
    Asgn16 = "", Other, HIDDEN;
    Asgn17 = "", Other, HIDDEN;
    Asgn18 = "", Other, HIDDEN;
    On = "ON", None, 0;
    Off = "OFF", None, 0;
    Key1g = "KEY 1 GTO", Label, HIDDEN;
    Key2g = "KEY 2 GTO", Label, HIDDEN;
    Key3g = "KEY 3 GTO", Label, HIDDEN;
    Key4g = "KEY 4 GTO", Label, HIDDEN;
    Key5g = "KEY 5 GTO", Label, HIDDEN;
    Key6g = "KEY 6 GTO", Label, HIDDEN;
    Key7g = "KEY 7 GTO", Label, HIDDEN;
    Key8g = "KEY 8 GTO", Label, HIDDEN;
    Key9g = "KEY 9 GTO", Label, HIDDEN;
    Key1x = "KEY 1 XEQ", Label, HIDDEN;
    Key2x = "KEY 2 XEQ", Label, HIDDEN;
    Key3x = "KEY 3 XEQ", Label, HIDDEN;
    Key4x = "KEY 4 XEQ", Label, HIDDEN;
    Key5x = "KEY 5 XEQ", Label, HIDDEN;
    Key6x = "KEY 6 XEQ", Label, HIDDEN;
    Key7x = "KEY 7 XEQ", Label, HIDDEN;
    Key8x = "KEY 8 XEQ", Label, HIDDEN;
    Key9x = "KEY 9 XEQ", Label, HIDDEN;
    VmExec = "", Other, HIDDEN;
    VmSto = "STO", Other, HIDDEN;
    SigmaReg = "ΣREG", Num99, 0;
    SigmaRegT = "ΣREG?", None, 0;
    ClD = "CLD", None, 0;
    Acosh = "ACOSH", None, 0;
    ALeng = "ALENG", None, 0;
    AllSigma = "ALLΣ", None, 0;
    And = "AND", None, 0;
    Aoff = "AOFF", None, 0;
    Aon = "AON", None, 0;
    Arot = "AROT", None, 0;
    Ashf = "ASHF", None, 0;
    Asinh = "ASINH", None, 0;
    Atanh = "ATANH", None, 0;
    Atox = "ATOX", None, 0;
    Baseadd = "BASE+", None, 0;
    Basesub = "BASE-", None, 0;
    Basemul = "BASE×", None, 0;
    Basediv = "BASE÷", None, 0;
    Basechs = "BASE+/-", None, 0;
    Best = "BEST", None, 0;
    Binm = "BINM", None, 0;
    BitT = "BIT?", None, 0;
    Bst = "BST", None, 0;
    Corr = "CORR", None, 0;
    Cosh = "COSH", None, 0;
    Cross = "CROSS", None, 0;
    Custom = "CUSTOM", None, 0;
    Decm = "DECM", None, 0;
    Delr = "DELR", None, 0;
    Det = "DET", None, 0;
    Dim = "DIM", Mat, 0;
    Dot = "DOT", None, 0;
    Edit = "EDIT", None, 0;
    EditN = "EDITN", Mat, 0;
    ExitAll = "EXITALL", None, 0;
    Expf = "EXPF", None, 0;
    EPowXMinus1 = "E^X-1", None, 0;
    Fcstx = "FCSTX", None, 0;
    Fcsty = "FCSTY", None, 0;
    Fnrm = "FNRM", None, 0;
    Getm = "GETM", None, 0;
    Grow = "GROW", None, 0;
    Hexm = "HEXM", None, 0;
    Hmsadd = "HMS+", None, 0;
    Hmssub = "HMS-", None, 0;
    IAdd = "I+", None, 0;
    ISub = "I-", None, 0;
    Index = "INDEX", Mat, 0;
    Insr = "INSR", None, 0;
    Integ = "INTEG", RVar, 0;
    Invrt = "INVRT", None, 0;
    JAdd = "J+", None, 0;
    JSub = "J-", None, 0;
    Linf = "LINF", None, 0;
    LinSigma = "LINΣ", None, 0;
    Ln1PlusX = "LN1+X", None, 0;
    Logf = "LOGF", None, 0;
    Mean = "MEAN", None, 0;
    Not = "NOT", None, 0;
    Octm = "OCTM", None, 0;
    Old = "OLD", None, 0;
    Or = "OR", None, 0;
    PgmSlv = "PGMSLV", Program, 0;
    PgmInt = "PGMINT", Program, 0;
    Posa = "POSA", None, 0;
    Putm = "PUTM", None, 0;
    Pwrf = "PWRF", None, 0;
    RclEl = "RCLEL", None, 0;
    RclIj = "RCLIJ", None, 0;
    Rnrm = "RNRM", None, 0;
    Rotxy = "ROTXY", None, 0;
    Rsum = "RSUM", None, 0;
    SwapR = "R<>R", None, 0;
    Sdev = "SDEV", None, 0;
    Sinh = "SINH", None, 0;
    Slope = "SLOPE", None, 0;
    Solve = "SOLVE", RVar, 0;
    StoEl = "STOEL", None, 0;
    StoIj = "STOIJ", None, 0;
    Sum = "SUM", None, 0;
    Tanh = "TANH", None, 0;
    Trans = "TRANS", None, 0;
    Uvec = "UVEC", None, 0;
    Wmean = "WMEAN", None, 0;
    Wrap = "WRAP", None, 0;
    XSwap = "X<>", Var, 0;
    Xor = "XOR", None, 0;
    Yint = "YINT", None, 0;
    ToDec = "→DEC", None, 0;
    ToOct = "→OCT", None, 0;
    Left = "←", None, 0;
    Up = "^", None, 0;
    Down = "↓", None, 0;
    Right = "→", None, 0;
    PercentCh = "%CH", None, 0;
    Simq = "SIMQ", Count, HIDDEN | NO_PRGM;
    Mata = "MATA", None, HIDDEN | NO_PRGM;
    Matb = "MATB", None, HIDDEN | NO_PRGM;
    Matx = "MATX", None, HIDDEN | NO_PRGM;
    GotoRow = "GOTO Row", Count, HIDDEN;
    GotoColumn = "GOTO Column", Count, HIDDEN;
    AThruF = "A...F", None, HIDDEN | NO_PRGM;
    ClAllB = "CLALL", None, HIDDEN;
    PgmSlvI = "PGMSLV", Program, HIDDEN;
    PgmIntI = "PGMINT", Program, HIDDEN;
    VmSto2 = "STO", Other, HIDDEN;
    VmSolve = "SOLVE", Other, HIDDEN;
    Max = "[MAX]", None, 0;
    Min = "[MIN]", None, 0;
    Find = "[FIND]", None, 0;
    Xrom = "XROM", Other, HIDDEN;
    Openf = "OPENF", None, 0;
    Closf = "CLOSF", None, 0;
    Readp = "READP", None, 0;
    Writp = "WRITP", None, 0;
    Getxy = "GETXY", None, 0;
    Putxy = "PUTXY", None, 0;
    Clrp = "CLRP", None, 0;
    Clrd = "CLRD", None, 0;
    Appd = "APPD", None, 0;
    Getn = "GETN", None, 0;
    Putn = "PUTN", None, 0;
    Getz = "GETZ", None, 0;
    Putz = "PUTZ", None, 0;
    Delp = "DELP", None, 0;
    Drop = "DROP", None, 0;
    Accel = "ACCEL", None, 0;
    Locat = "LOCAT", None, 0;
    Heading = "HEADING", None, 0;
    Adate = "ADATE", None, 0;
    Almcat = "ALMCAT", None, HIDDEN;
    Almnow = "ALMNOW", None, HIDDEN;
    Atime = "ATIME", None, 0;
    Atime24 = "ATIME24", None, 0;
    Clk12 = "CLK12", None, 0;
    Clk24 = "CLK24", None, 0;
    Clkt = "CLKT", None, HIDDEN;
    Clktd = "CLKTD", None, HIDDEN;
    Clock = "CLOCK", None, HIDDEN;
    Correct = "CORRECT", None, HIDDEN;
    Date = "DATE", None, 0;
    DatePlus = "DATE+", None, 0;
    Ddays = "DDAYS", None, 0;
    Dmy = "DMY", None, 0;
    Dow = "DOW", None, 0;
    Mdy = "MDY", None, 0;
    Rclaf = "RCLAF", None, HIDDEN;
    Rclsw = "RCLSW", None, HIDDEN;
    Runsw = "RUNSW", None, HIDDEN;
    Setaf = "SETAF", None, HIDDEN;
    Setdate = "SETDATE", None, HIDDEN;
    Setime = "SETIME", None, HIDDEN;
    Setsw = "SETSW", None, HIDDEN;
    Stopsw = "STOPSW", None, HIDDEN;
    Sw = "SW", None, HIDDEN;
    TPlusX = "T+X", None, HIDDEN;
    Time = "TIME", None, 0;
    Xyzalm = "XYZALM", None, HIDDEN;
    Clalma = "CLALMA", None, HIDDEN;
    Clalmx = "CLALMX", None, HIDDEN;
    Clralms = "CLRALMS", None, HIDDEN;
    Rclalm = "RCLALM", None, HIDDEN;
    Swpt = "SWPT", None, HIDDEN;
    FpTest = "FPTEST", None, 0;
    LSto = "LSTO", Named, 0;
    SstUp = "SST^", None, 0;
    SstRt = "SST→", None, 0;
    Wsize = "WSIZE", None, 0;
    WsizeT = "WSIZE?", None, 0;
    Ymd = "YMD", None, 0;
    Bsigned = "BSIGNED", None, 0;
    Bwrap = "BWRAP", None, 0;
    Breset = "BRESET", None, 0;
    Func = "FUNC", Num99, PRGM_ONLY;
    L4Stk = "L4STK", None, PRGM_ONLY;
    LnStk = "LNSTK", None, PRGM_ONLY;
    FourStk = "4STK", None, 0;
    NStk = "NSTK", None, 0;
    RtnYes = "RTNYES", None, PRGM_ONLY;
    RtnNo = "RTNNO", None, PRGM_ONLY;
    RtnErr = "RTNERR", Num99, PRGM_ONLY;
    NewList = "NEWLIST", None, 0;
    XStr = "XSTR", XStr, 0;
    Dup = "DUP", None, 0;
}

impl Opcode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Opcode> {
        ALL.get(code as usize).copied()
    }

    pub fn count() -> usize {
        ALL.len()
    }

    pub fn all() -> impl Iterator<Item = Opcode> {
        ALL.iter().copied()
    }

    pub fn name(self) -> &'static str {
        SPECS[self as usize].name
    }

    pub fn arg_kind(self) -> ArgKind {
        SPECS[self as usize].arg
    }

    pub fn flags(self) -> u8 {
        SPECS[self as usize].flags
    }

    pub fn is_hidden(self) -> bool {
        self.flags() & HIDDEN != 0
    }

    pub fn is_program_only(self) -> bool {
        self.flags() & PRGM_ONLY != 0
    }

    pub fn is_immediate(self) -> bool {
        self.flags() & IMMED != 0
    }

    pub fn is_programmable(self) -> bool {
        self.flags() & NO_PRGM == 0
    }

    /// GTO and XEQ with a numeric or letter label carry a four byte
    /// jump cache after their argument.
    pub fn has_target_cache(self) -> bool {
        matches!(self, Opcode::Gto | Opcode::Xeq)
    }

    /// Looks up a visible command by its display name. `/`, `*`, `^`
    /// and a handful of spelled-out forms stand in for the special
    /// characters so commands can be typed on an ordinary keyboard.
    pub fn from_name(name: &str) -> Option<Opcode> {
        let name = name.to_ascii_uppercase();
        let name = match name.as_str() {
            "/" => "÷".to_string(),
            "*" => "×".to_string(),
            "RDN" => "R↓".to_string(),
            "CHS" => "+/-".to_string(),
            "SWAP" => "X<>Y".to_string(),
            "Y^X" | "X^2" | "E^X" | "10^X" | "R^" => name,
            _ => name
                .replace("STO/", "STO÷")
                .replace("STO*", "STO×")
                .replace("RCL/", "RCL÷")
                .replace("RCL*", "RCL×")
                .replace("<>", "\u{1}")
                .replace("!=", "≠")
                .replace("<=", "≤")
                .replace(">=", "≥")
                .replace("->", "→")
                .replace('\u{1}', "<>")
                .replace("SIGMA", "Σ"),
        };
        Opcode::all().find(|op| !op.is_hidden() && op.name() == name)
    }
}

impl std::fmt::Debug for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Opcode::Number => write!(f, "NUMBER"),
            Opcode::Str => write!(f, "STRING"),
            _ if self.name().is_empty() => write!(f, "#{}", self.code()),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_fit_in_eleven_bits() {
        assert!(Opcode::count() < 2048);
        for op in Opcode::all() {
            assert_eq!(Opcode::from_code(op.code()), Some(op));
        }
        assert_eq!(Opcode::from_code(Opcode::count() as u16), None);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Opcode::from_name("sto"), Some(Opcode::Sto));
        assert_eq!(Opcode::from_name("/"), Some(Opcode::Div));
        assert_eq!(Opcode::from_name("STO*"), Some(Opcode::StoMul));
        assert_eq!(Opcode::from_name("X<>Y"), Some(Opcode::Swap));
        assert_eq!(Opcode::from_name("X!=0?"), Some(Opcode::XNe0));
        assert_eq!(Opcode::from_name("X<=Y?"), Some(Opcode::XLeY));
        assert_eq!(Opcode::from_name("->DEG"), Some(Opcode::ToDeg));
        assert_eq!(Opcode::from_name("SIGMA+"), Some(Opcode::SigmaAdd));
        assert_eq!(Opcode::from_name("FUNC"), Some(Opcode::Func));
        assert_eq!(Opcode::from_name("4STK"), Some(Opcode::FourStk));
        assert_eq!(Opcode::from_name("CLALL"), Some(Opcode::ClAllA));
        assert_eq!(Opcode::from_name("NO SUCH"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Opcode::Div.to_string(), "÷");
        assert_eq!(Opcode::Number.to_string(), "NUMBER");
        assert_eq!(Opcode::Asgn01.to_string(), format!("#{}", Opcode::Asgn01.code()));
    }
}
