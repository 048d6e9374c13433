//! Instruction set

macro_rules! opcodes {
    ($($name:ident = $byte:literal,)*) => {
        /// Every opcode the executor understands
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $byte,)*
        }

        impl Opcode {
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$name),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    LoadConst = 0x01,
    LoadField = 0x02,
    LoadNothing = 0x03,
    Copy = 0x04,

    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,
    Negate = 0x15,

    Eq = 0x20,
    Neq = 0x21,
    Lt = 0x22,
    Gt = 0x23,
    Lte = 0x24,
    Gte = 0x25,

    And = 0x30,
    Or = 0x31,
    Not = 0x32,

    StrConcat = 0x40,

    IsString = 0x50,
    IsInt = 0x51,
    IsFloat = 0x52,
    IsBool = 0x53,
    IsNothing = 0x54,
    IsList = 0x55,
    IsRecord = 0x56,
    ToString = 0x58,
    ToInt = 0x59,
    ToFloat = 0x5A,
    ToBool = 0x5B,

    RecordNew = 0x60,
    RecordSet = 0x61,
    RecordGet = 0x62,
    RecordHas = 0x63,

    ListNew = 0x70,
    ListAppend = 0x71,
    ListGet = 0x72,
    ListLength = 0x73,

    Jump = 0x80,
    JumpIf = 0x81,
    JumpIfNot = 0x82,
    Coalesce = 0x85,

    IterSetup = 0x90,
    IterCollect = 0x91,

    StdlibCall = 0xA0,

    TagSet = 0xB0,
    TagCheck = 0xB1,

    // superinstructions
    RecordGetC = 0xC1,
    RecordSetC = 0xC2,
    RecordNewSetC = 0xC3,
    StdlibCall1 = 0xC4,
    CmpJumpEq = 0xC5,
    CmpJumpNeq = 0xC6,
    CmpJumpLt = 0xC7,
    CmpJumpGt = 0xC8,
    CmpJumpLte = 0xC9,
    CmpJumpGte = 0xCA,
    IsNothingJump = 0xCB,
}

impl Opcode {
    pub fn byte(self) -> u8 {
        self as u8
    }
}
