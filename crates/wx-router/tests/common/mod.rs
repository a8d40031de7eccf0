//! Scripted weather service for router tests
//!
//! Every decision the real service makes (channel limit, capacity rejection,
//! page contents, notification delivery) is scripted per test. Notifications
//! are delivered from plain OS threads to mimic a service-owned context.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use wx_common::{
    ChannelHandle, CorrelationId, NotificationKind, RequestOptions, ResultPage, WeatherInfoReady,
    WeatherRecord,
};
use wx_service::{NotificationCallback, Result, ServiceError, WeatherService};

#[derive(Debug, Clone)]
pub enum PageStep {
    Page(Vec<WeatherRecord>, bool),
    Fail,
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    Accept,
    Busy,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Never,
    Once,
    Twice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCall {
    pub channel: ChannelHandle,
    pub location: String,
    pub accepted: bool,
}

type SendDecider = Box<dyn Fn(usize, usize, &str) -> SendDecision + Send + Sync>;

#[derive(Default)]
struct State {
    next_channel: u64,
    open_attempts: usize,
    open: Vec<ChannelHandle>,
    closed: Vec<ChannelHandle>,
    callbacks: HashMap<ChannelHandle, NotificationCallback>,
    sends: Vec<SendCall>,
    requests: HashMap<CorrelationId, VecDeque<PageStep>>,
    page_calls: usize,
}

pub struct ScriptedService {
    locations: Vec<String>,
    max_channels: usize,
    fail_open_at: Option<usize>,
    repeat_handle: Option<ChannelHandle>,
    fail_close: bool,
    fail_registration: bool,
    delivery: Delivery,
    notify_delay: Duration,
    send_decider: SendDecider,
    page_scripts: HashMap<String, Vec<PageStep>>,
    state: Mutex<State>,
    peak_open: AtomicUsize,
}

impl ScriptedService {
    pub fn new(locations: &[&str]) -> Self {
        Self {
            locations: locations.iter().map(|l| l.to_string()).collect(),
            max_channels: 3,
            fail_open_at: None,
            repeat_handle: None,
            fail_close: false,
            fail_registration: false,
            delivery: Delivery::Once,
            notify_delay: Duration::from_millis(5),
            send_decider: Box::new(|_, _, _| SendDecision::Accept),
            page_scripts: HashMap::new(),
            state: Mutex::new(State::default()),
            peak_open: AtomicUsize::new(0),
        }
    }

    pub fn with_max_channels(mut self, max: usize) -> Self {
        self.max_channels = max;
        self
    }

    pub fn failing_open_at(mut self, attempt: usize) -> Self {
        self.fail_open_at = Some(attempt);
        self
    }

    /// Every open returns `handle`
    pub fn repeating_handle(mut self, handle: ChannelHandle) -> Self {
        self.repeat_handle = Some(handle);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn failing_registration(mut self) -> Self {
        self.fail_registration = true;
        self
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// `decide(call_index, channel_index, location)`
    pub fn with_send<F>(mut self, decide: F) -> Self
    where
        F: Fn(usize, usize, &str) -> SendDecision + Send + Sync + 'static,
    {
        self.send_decider = Box::new(decide);
        self
    }

    pub fn with_pages(mut self, location: &str, steps: Vec<PageStep>) -> Self {
        self.page_scripts.insert(location.to_string(), steps);
        self
    }

    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open.len()
    }

    pub fn closed(&self) -> Vec<ChannelHandle> {
        self.state.lock().closed.clone()
    }

    pub fn sends(&self) -> Vec<SendCall> {
        self.state.lock().sends.clone()
    }

    pub fn accepted(&self) -> Vec<SendCall> {
        self.sends().into_iter().filter(|s| s.accepted).collect()
    }

    pub fn page_calls(&self) -> usize {
        self.state.lock().page_calls
    }

    /// Accept a request outside the dispatcher, for drainer tests
    pub fn seed_request(&self, location: &str) -> CorrelationId {
        let id = CorrelationId::new_v4();
        let script = self.script_for(location);
        self.state.lock().requests.insert(id, script);
        id
    }

    fn script_for(&self, location: &str) -> VecDeque<PageStep> {
        self.page_scripts
            .get(location)
            .cloned()
            .unwrap_or_else(|| vec![PageStep::Page(Vec::new(), false)])
            .into()
    }
}

#[async_trait]
impl WeatherService for ScriptedService {
    async fn supported_locations(&self) -> Result<Vec<String>> {
        Ok(self.locations.clone())
    }

    async fn open_channel(&self) -> Result<ChannelHandle> {
        let mut state = self.state.lock();
        let attempt = state.open_attempts;
        state.open_attempts += 1;

        if self.fail_open_at == Some(attempt) || state.open.len() >= self.max_channels {
            return Err(ServiceError::TooManyChannels);
        }

        state.next_channel += 1;
        let channel = self
            .repeat_handle
            .unwrap_or(ChannelHandle(state.next_channel));
        if !state.open.contains(&channel) {
            state.open.push(channel);
        }
        self.peak_open.fetch_max(state.open.len(), Ordering::SeqCst);
        Ok(channel)
    }

    async fn close_channel(&self, channel: ChannelHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.open.retain(|c| *c != channel);
        state.callbacks.remove(&channel);
        state.closed.push(channel);
        if self.fail_close {
            return Err(ServiceError::Unavailable("scripted close failure".to_string()));
        }
        Ok(())
    }

    fn register_notification_callback(
        &self,
        channel: ChannelHandle,
        _kind: NotificationKind,
        callback: NotificationCallback,
    ) -> Result<()> {
        if self.fail_registration {
            return Err(ServiceError::Unavailable("scripted registration failure".to_string()));
        }
        let mut state = self.state.lock();
        if !state.open.contains(&channel) {
            return Err(ServiceError::InvalidChannel(channel));
        }
        state.callbacks.insert(channel, callback);
        Ok(())
    }

    async fn send_request(
        &self,
        channel: ChannelHandle,
        location: &str,
        _options: Option<&RequestOptions>,
    ) -> Result<CorrelationId> {
        let script = self.script_for(location);
        let mut state = self.state.lock();
        let channel_index = state
            .open
            .iter()
            .position(|c| *c == channel)
            .ok_or(ServiceError::InvalidChannel(channel))?;
        let call = state.sends.len();
        let decision = (self.send_decider)(call, channel_index, location);

        state.sends.push(SendCall {
            channel,
            location: location.to_string(),
            accepted: decision == SendDecision::Accept,
        });

        match decision {
            SendDecision::Busy => Err(ServiceError::TooManyRequests),
            SendDecision::Fail => Err(ServiceError::Unavailable("scripted send failure".to_string())),
            SendDecision::Accept => {
                let request_id = CorrelationId::new_v4();
                state.requests.insert(request_id, script);

                let times = match self.delivery {
                    Delivery::Never => 0,
                    Delivery::Once => 1,
                    Delivery::Twice => 2,
                };
                if let (Some(callback), true) = (state.callbacks.get(&channel).cloned(), times > 0) {
                    let delay = self.notify_delay;
                    std::thread::spawn(move || {
                        std::thread::sleep(delay);
                        for _ in 0..times {
                            callback(
                                NotificationKind::WeatherInfoReady,
                                WeatherInfoReady { channel, request_id },
                            );
                        }
                    });
                }
                Ok(request_id)
            }
        }
    }

    async fn next_result_page(
        &self,
        _channel: ChannelHandle,
        request_id: CorrelationId,
    ) -> Result<ResultPage> {
        let mut state = self.state.lock();
        state.page_calls += 1;
        let step = state
            .requests
            .get_mut(&request_id)
            .and_then(|steps| steps.pop_front())
            .ok_or(ServiceError::UnknownRequest(request_id))?;

        match step {
            PageStep::Page(records, has_more) => Ok(ResultPage::new(records, has_more)),
            PageStep::Fail => Err(ServiceError::Unavailable("scripted page failure".to_string())),
            PageStep::Panic => {
                drop(state);
                panic!("scripted page panic")
            }
        }
    }
}

pub fn record(city: &str, day: u32, temp: i32) -> WeatherRecord {
    WeatherRecord::new(city, NaiveDate::from_ymd_opt(2016, 1, day).unwrap(), temp)
}
