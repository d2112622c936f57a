// cl_parse.rs -- parse a message received from the server
//
// Only the control messages this layer acts on are understood. Game
// content is somebody else's business, so anything else ends the game.

use qcore_common::common::MsgReader;
use qcore_common::error::QResult;
use qcore_common::qcommon::{
    SIGNONS, SVC_DISCONNECT, SVC_NOP, SVC_PRINT, SVC_SIGNONNUM, SVC_STUFFTEXT, SVC_TIME,
};

use crate::cl_main::{host_end_game, host_error, Client};

pub fn cl_parse_server_message(client: &mut Client) -> QResult<()> {
    let data = client.net_message.as_slice().to_vec();
    let mut msg = MsgReader::from_bytes(&data);

    loop {
        if msg.badread {
            return host_error(client, "CL_ParseServerMessage: Bad server message");
        }

        let cmd = msg.read_byte();
        if cmd == -1 {
            return Ok(()); // end of message
        }

        match cmd as u8 {
            SVC_NOP => {}

            SVC_TIME => {
                client.cl.mtime[1] = client.cl.mtime[0];
                client.cl.mtime[0] = msg.read_float() as f64;
            }

            SVC_PRINT => {
                let text = msg.read_string();
                client.con.printf(&text);
            }

            SVC_STUFFTEXT => {
                let text = msg.read_string();
                client.cmd.cbuf_add_text(&text);
            }

            SVC_SIGNONNUM => {
                let i = msg.read_byte();
                if i <= client.cls.signon || i > SIGNONS {
                    return host_error(
                        client,
                        &format!("Received signon {} when at {}", i, client.cls.signon),
                    );
                }
                client.cls.signon = i;
            }

            SVC_DISCONNECT => return host_end_game(client, "Server disconnected"),

            _ => {
                client.con.dprintf(&format!("svc {} at {}\n", cmd, msg.readcount - 1));
                return host_error(client, "CL_ParseServerMessage: Illegible server message");
            }
        }
    }
}
