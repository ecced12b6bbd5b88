/// One discrete action issued by the operator during calibration. The view
/// layer translates raw input into these; state transitions never see key
/// codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShiftXNeg,
    ShiftXPos,
    ShiftYNeg,
    ShiftYPos,
    LeftStartBack,
    LeftStartForward,
    RightStartBack,
    RightStartForward,
    RotateGlobalNeg,
    RotateGlobalPos,
    RotateLocalNeg,
    RotateLocalPos,
    SeekBack,
    SeekForward,
    ToggleAnaglyph,
    ToggleGrid,
    Reset,
    NextPair,
    Quit,
}

impl Command {
    /// Whether this command alters calibration data. Display toggles and
    /// flow commands leave the record clean.
    pub fn edits_state(&self) -> bool {
        !matches!(
            self,
            Command::ToggleAnaglyph | Command::ToggleGrid | Command::NextPair | Command::Quit
        )
    }
}
