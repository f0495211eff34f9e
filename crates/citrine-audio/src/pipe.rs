#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DspError {
    #[error("unknown DSP pipe {0}")]
    UnknownPipe(u32),

    #[error("unknown DSP state-change request {0}")]
    UnknownStateChange(u32),
}

/// Pipe channels between the application cores and the DSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DspPipe {
    Debug = 0,
    Dma = 1,
    Audio = 2,
    Binary = 3,
}

impl DspPipe {
    pub const ALL: [DspPipe; 4] = [DspPipe::Debug, DspPipe::Dma, DspPipe::Audio, DspPipe::Binary];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for DspPipe {
    type Error = DspError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DspPipe::Debug),
            1 => Ok(DspPipe::Dma),
            2 => Ok(DspPipe::Audio),
            3 => Ok(DspPipe::Binary),
            other => Err(DspError::UnknownPipe(other)),
        }
    }
}

/// Power state of the DSP as driven through the audio pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DspState {
    #[default]
    Off,
    On,
    Sleeping,
}

/// Kind of interrupt raised towards the DSP service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    Zero,
    One,
    Pipe,
}

/// Requests an application writes to the audio pipe to change the DSP power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateChange {
    Initialize,
    Shutdown,
    Wakeup,
    Sleep,
}

impl TryFrom<u32> for StateChange {
    type Error = DspError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StateChange::Initialize),
            1 => Ok(StateChange::Shutdown),
            2 => Ok(StateChange::Wakeup),
            3 => Ok(StateChange::Sleep),
            other => Err(DspError::UnknownStateChange(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pipe_ids_round_trip_through_u32() {
        for pipe in DspPipe::ALL {
            assert_eq!(DspPipe::try_from(pipe as u32), Ok(pipe));
        }
        assert_eq!(DspPipe::try_from(4), Err(DspError::UnknownPipe(4)));
    }
}
