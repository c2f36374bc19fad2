//! Reply construction helpers shared by the dispatcher and forwarder.

use hickory_proto::op::{Message, MessageType, ResponseCode};

/// A response skeleton mirroring the request: same id and opcode,
/// recursion bits echoed, first question copied. Additional questions
/// are dropped.
pub fn reply_template(request: &Message) -> Message {
    let mut reply = Message::new();
    reply.set_id(request.id());
    reply.set_message_type(MessageType::Response);
    reply.set_op_code(request.op_code());
    reply.set_recursion_desired(request.recursion_desired());
    reply.set_recursion_available(true);
    if let Some(question) = request.queries().first() {
        reply.add_query(question.clone());
    }
    reply
}

pub fn reply_with_code(request: &Message, code: ResponseCode) -> Message {
    let mut reply = reply_template(request);
    reply.set_response_code(code);
    reply
}
