/// 每帧传给 Execute 的上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameContext {
    /// 一直累加的帧序号
    pub frame_id: u64,
    /// 当前帧在 frames-in-flight 环中的位置
    pub frame_in_flight: usize,
    pub frames_in_flight: usize,
}

impl FrameContext {
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}#{}]", self.frame_id, self.frame_in_flight)
    }
}

pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    frames_in_flight: usize,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, frames_in_flight: usize) -> Self {
        Self {
            frame_id: init_frame_id,
            frames_in_flight: frames_in_flight.max(1),
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
    #[inline]
    pub fn frame_in_flight(&self) -> usize {
        (self.frame_id % self.frames_in_flight as u64) as usize
    }
    #[inline]
    pub fn frame_context(&self) -> FrameContext {
        FrameContext {
            frame_id: self.frame_id,
            frame_in_flight: self.frame_in_flight(),
            frames_in_flight: self.frames_in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_in_flight_wraps() {
        let mut counter = FrameCounter::new(0, 3);
        let slots: Vec<_> = (0..5)
            .map(|_| {
                let slot = counter.frame_in_flight();
                counter.next_frame();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1]);
        assert_eq!(counter.frame_context().frame_name(), "[F5#2]");
    }

    #[test]
    fn test_zero_frames_in_flight_clamped() {
        let counter = FrameCounter::new(7, 0);
        assert_eq!(counter.frames_in_flight(), 1);
        assert_eq!(counter.frame_in_flight(), 0);
    }
}
