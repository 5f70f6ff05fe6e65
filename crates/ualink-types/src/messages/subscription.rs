// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription and MonitoredItem service sets, including Publish.

use crate::codec::ua_struct;
use crate::messages::{
    ua_enum, ua_service, RequestHeader, ResponseHeader, TimestampsToReturn,
};
use crate::messages::attribute::ReadValueId;
use crate::status::StatusCode;
use crate::time::UaDateTime;
use crate::variant::{DiagnosticInfo, ExtensionObject};

// =============================================================================
// Subscription lifecycle
// =============================================================================

ua_struct! {
    /// Creates a subscription on the session.
    pub struct CreateSubscriptionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Requested publishing interval in milliseconds.
        pub requested_publishing_interval: f64,
        /// Publishing intervals the subscription survives without a Publish.
        pub requested_lifetime_count: u32,
        /// Intervals between keep-alive notifications.
        pub requested_max_keep_alive_count: u32,
        /// Cap on notifications per Publish response (0 = no limit).
        pub max_notifications_per_publish: u32,
        /// Whether publishing starts enabled.
        pub publishing_enabled: bool,
        /// Relative priority against other subscriptions.
        pub priority: u8,
    }
}

ua_struct! {
    /// The server's answer to [`CreateSubscriptionRequest`].
    pub struct CreateSubscriptionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Server-assigned subscription id.
        pub subscription_id: u32,
        /// Granted publishing interval in milliseconds.
        pub revised_publishing_interval: f64,
        /// Granted lifetime count.
        pub revised_lifetime_count: u32,
        /// Granted keep-alive count.
        pub revised_max_keep_alive_count: u32,
    }
}

ua_service!(CreateSubscriptionRequest => CreateSubscriptionResponse, 787, 790);

ua_struct! {
    /// Changes the settings of an existing subscription.
    pub struct ModifySubscriptionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription to modify.
        pub subscription_id: u32,
        /// Requested publishing interval in milliseconds.
        pub requested_publishing_interval: f64,
        /// Requested lifetime count.
        pub requested_lifetime_count: u32,
        /// Requested keep-alive count.
        pub requested_max_keep_alive_count: u32,
        /// Cap on notifications per Publish response (0 = no limit).
        pub max_notifications_per_publish: u32,
        /// Relative priority against other subscriptions.
        pub priority: u8,
    }
}

ua_struct! {
    /// The server's answer to [`ModifySubscriptionRequest`].
    pub struct ModifySubscriptionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Granted publishing interval in milliseconds.
        pub revised_publishing_interval: f64,
        /// Granted lifetime count.
        pub revised_lifetime_count: u32,
        /// Granted keep-alive count.
        pub revised_max_keep_alive_count: u32,
    }
}

ua_service!(ModifySubscriptionRequest => ModifySubscriptionResponse, 793, 796);

ua_struct! {
    /// Enables or disables publishing for subscriptions.
    pub struct SetPublishingModeRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The new publishing mode.
        pub publishing_enabled: bool,
        /// The subscriptions to change.
        pub subscription_ids: Vec<u32>,
    }
}

ua_struct! {
    /// The server's answer to [`SetPublishingModeRequest`].
    pub struct SetPublishingModeResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per subscription.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(SetPublishingModeRequest => SetPublishingModeResponse, 799, 802);

ua_struct! {
    /// Deletes subscriptions.
    pub struct DeleteSubscriptionsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscriptions to delete.
        pub subscription_ids: Vec<u32>,
    }
}

ua_struct! {
    /// The server's answer to [`DeleteSubscriptionsRequest`].
    pub struct DeleteSubscriptionsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per subscription.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(DeleteSubscriptionsRequest => DeleteSubscriptionsResponse, 845, 848);

// =============================================================================
// Publish / Republish
// =============================================================================

ua_struct! {
    /// Acknowledges one delivered notification message.
    pub struct SubscriptionAcknowledgement {
        /// The subscription the message belonged to.
        pub subscription_id: u32,
        /// Sequence number being acknowledged.
        pub sequence_number: u32,
    }
}

ua_struct! {
    /// A batch of notifications for one publishing interval.
    pub struct NotificationMessage {
        /// Sequence number of this message.
        pub sequence_number: u32,
        /// When the message was published.
        pub publish_time: UaDateTime,
        /// The notifications, each wrapped as an extension object.
        pub notification_data: Vec<ExtensionObject>,
    }
}

impl NotificationMessage {
    /// Returns `true` when the message carries no notifications
    /// (a keep-alive).
    #[inline]
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_empty()
    }
}

ua_struct! {
    /// Asks the server to deliver queued notifications.
    pub struct PublishRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Acknowledgements for previously delivered messages.
        pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
    }
}

ua_struct! {
    /// The server's answer to [`PublishRequest`].
    pub struct PublishResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Subscription the notifications belong to.
        pub subscription_id: u32,
        /// Sequence numbers available for republishing.
        pub available_sequence_numbers: Vec<u32>,
        /// `true` if more notifications are queued.
        pub more_notifications: bool,
        /// The notifications for this interval.
        pub notification_message: NotificationMessage,
        /// One status per acknowledgement sent in the request.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(PublishRequest => PublishResponse, 826, 829);

ua_struct! {
    /// Requests retransmission of a lost notification message.
    pub struct RepublishRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription the message belonged to.
        pub subscription_id: u32,
        /// Sequence number to retransmit.
        pub retransmit_sequence_number: u32,
    }
}

ua_struct! {
    /// The server's answer to [`RepublishRequest`].
    pub struct RepublishResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The retransmitted message.
        pub notification_message: NotificationMessage,
    }
}

ua_service!(RepublishRequest => RepublishResponse, 832, 835);

// =============================================================================
// Monitored items
// =============================================================================

ua_enum! {
    /// Sampling and reporting behavior of a monitored item.
    pub enum MonitoringMode {
        /// Neither sampling nor reporting.
        Disabled = 0,
        /// Sampling without reporting.
        Sampling = 1,
        /// Sampling and reporting.
        Reporting = 2,
    }
}

impl Default for MonitoringMode {
    fn default() -> Self {
        Self::Reporting
    }
}

ua_struct! {
    /// Sampling parameters of a monitored item.
    pub struct MonitoringParameters {
        /// Client-chosen handle echoed in notifications.
        pub client_handle: u32,
        /// Sampling interval in milliseconds; -1 inherits the subscription's.
        pub sampling_interval: f64,
        /// Data change filter, wrapped as an extension object.
        pub filter: ExtensionObject,
        /// Values queued between publishing intervals.
        pub queue_size: u32,
        /// Drop the oldest value when the queue overflows.
        pub discard_oldest: bool,
    }
}

ua_struct! {
    /// One monitored item to create.
    pub struct MonitoredItemCreateRequest {
        /// The attribute to monitor.
        pub item_to_monitor: ReadValueId,
        /// Initial monitoring mode.
        pub monitoring_mode: MonitoringMode,
        /// Sampling parameters.
        pub requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    /// Result for one created monitored item.
    pub struct MonitoredItemCreateResult {
        /// Outcome for this item.
        pub status_code: StatusCode,
        /// Server-assigned monitored item id.
        pub monitored_item_id: u32,
        /// Granted sampling interval in milliseconds.
        pub revised_sampling_interval: f64,
        /// Granted queue size.
        pub revised_queue_size: u32,
        /// Validation of the filter, wrapped as an extension object.
        pub filter_result: ExtensionObject,
    }
}

ua_struct! {
    /// Creates monitored items within a subscription.
    pub struct CreateMonitoredItemsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// Which timestamps notifications carry.
        pub timestamps_to_return: TimestampsToReturn,
        /// The items to create.
        pub items_to_create: Vec<MonitoredItemCreateRequest>,
    }
}

ua_struct! {
    /// The server's answer to [`CreateMonitoredItemsRequest`].
    pub struct CreateMonitoredItemsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per item.
        pub results: Vec<MonitoredItemCreateResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(CreateMonitoredItemsRequest => CreateMonitoredItemsResponse, 749, 752);

ua_struct! {
    /// One monitored item to modify.
    pub struct MonitoredItemModifyRequest {
        /// The item to modify.
        pub monitored_item_id: u32,
        /// New sampling parameters.
        pub requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    /// Result for one modified monitored item.
    pub struct MonitoredItemModifyResult {
        /// Outcome for this item.
        pub status_code: StatusCode,
        /// Granted sampling interval in milliseconds.
        pub revised_sampling_interval: f64,
        /// Granted queue size.
        pub revised_queue_size: u32,
        /// Validation of the filter, wrapped as an extension object.
        pub filter_result: ExtensionObject,
    }
}

ua_struct! {
    /// Modifies monitored items within a subscription.
    pub struct ModifyMonitoredItemsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// Which timestamps notifications carry.
        pub timestamps_to_return: TimestampsToReturn,
        /// The modifications to apply.
        pub items_to_modify: Vec<MonitoredItemModifyRequest>,
    }
}

ua_struct! {
    /// The server's answer to [`ModifyMonitoredItemsRequest`].
    pub struct ModifyMonitoredItemsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per item.
        pub results: Vec<MonitoredItemModifyResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(ModifyMonitoredItemsRequest => ModifyMonitoredItemsResponse, 761, 764);

ua_struct! {
    /// Changes the monitoring mode of monitored items.
    pub struct SetMonitoringModeRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// The new mode.
        pub monitoring_mode: MonitoringMode,
        /// The items to change.
        pub monitored_item_ids: Vec<u32>,
    }
}

ua_struct! {
    /// The server's answer to [`SetMonitoringModeRequest`].
    pub struct SetMonitoringModeResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per item.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(SetMonitoringModeRequest => SetMonitoringModeResponse, 767, 770);

ua_struct! {
    /// Deletes monitored items from a subscription.
    pub struct DeleteMonitoredItemsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// The items to delete.
        pub monitored_item_ids: Vec<u32>,
    }
}

ua_struct! {
    /// The server's answer to [`DeleteMonitoredItemsRequest`].
    pub struct DeleteMonitoredItemsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per item.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(DeleteMonitoredItemsRequest => DeleteMonitoredItemsResponse, 779, 782);

// =============================================================================
// Notification bodies
// =============================================================================

ua_struct! {
    /// One changed value inside a data change notification.
    pub struct MonitoredItemNotification {
        /// Client handle of the monitored item.
        pub client_handle: u32,
        /// The new value.
        pub value: crate::variant::DataValue,
    }
}

ua_struct! {
    /// The data change notification carried in a Publish response.
    pub struct DataChangeNotification {
        /// The changed values.
        pub monitored_items: Vec<MonitoredItemNotification>,
        /// Per-item diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

impl crate::messages::UaMessage for DataChangeNotification {
    const TYPE_ID: u32 = 811;
}

// =============================================================================
// Tests
// =============================================================================
